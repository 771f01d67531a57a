use serde::Serialize;
use std::{fmt::Display, str::FromStr};

/// The two related configuration dialects. Both share the `[Section]` /
/// `key = value` syntax and differ in section naming.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub enum Dialect {
    OpenBullet,
    SilverBullet,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SectionKind {
    Request,
    Data,
    Headers,
    Tokens,
    Other,
}

impl Dialect {
    /// Canonical section name for `kind`, `None` when the dialect cannot express it.
    pub fn section_name(self, kind: SectionKind) -> Option<&'static str> {
        match (self, kind) {
            (Dialect::OpenBullet, SectionKind::Request) => Some("Requests"),
            (Dialect::OpenBullet, SectionKind::Data) => Some("Data"),
            (Dialect::OpenBullet, SectionKind::Headers) => Some("Headers"),
            (Dialect::OpenBullet, SectionKind::Tokens) => None,
            (Dialect::SilverBullet, SectionKind::Request) => Some("Request"),
            (Dialect::SilverBullet, SectionKind::Data) => Some("Payload"),
            (Dialect::SilverBullet, SectionKind::Headers) => Some("Headers"),
            (Dialect::SilverBullet, SectionKind::Tokens) => Some("Capture"),
            (_, SectionKind::Other) => None,
        }
    }

    pub fn supports_token_rules(self) -> bool {
        self.section_name(SectionKind::Tokens).is_some()
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "loli" => Some(Dialect::OpenBullet),
            "sb" => Some(Dialect::SilverBullet),
            _ => None,
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::OpenBullet => write!(f, "OpenBullet"),
            Dialect::SilverBullet => write!(f, "SilverBullet"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openbullet" | "ob" | "loli" => Ok(Dialect::OpenBullet),
            "silverbullet" | "sb" => Ok(Dialect::SilverBullet),
            other => Err(format!("unknown dialect `{}`", other)),
        }
    }
}

impl SectionKind {
    /// Classifies a section name, also reporting which dialect the spelling belongs to.
    /// Either dialect's spelling is accepted.
    pub fn classify(name: &str) -> (SectionKind, Option<Dialect>) {
        match name.to_lowercase().as_str() {
            "requests" => (SectionKind::Request, Some(Dialect::OpenBullet)),
            "request" => (SectionKind::Request, Some(Dialect::SilverBullet)),
            "data" => (SectionKind::Data, Some(Dialect::OpenBullet)),
            "payload" => (SectionKind::Data, Some(Dialect::SilverBullet)),
            "capture" => (SectionKind::Tokens, Some(Dialect::SilverBullet)),
            "headers" => (SectionKind::Headers, None),
            _ => (SectionKind::Other, None),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    /// Written as `[[name]]`; such sections may appear more than once.
    pub repeated: bool,
    /// All entries in file order. Duplicate keys are kept and reported, not merged.
    pub entries: Vec<Entry>,
}

impl Section {
    pub fn new<S: Into<String>>(name: S, repeated: bool) -> Self {
        Self {
            name: name.into(),
            repeated,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> SectionKind {
        SectionKind::classify(&self.name).0
    }

    pub fn push<S1: Into<String>, S2: Into<String>>(&mut self, key: S1, value: S2) {
        self.entries.push(Entry {
            key: key.into(),
            value: value.into(),
        });
    }

    /// First value for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key.eq_ignore_ascii_case(key))
            .map(|e| e.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn header_line(&self) -> String {
        if self.repeated {
            format!("[[{}]]", self.name)
        } else {
            format!("[{}]", self.name)
        }
    }

    /// Keys that appear more than once, in order of their second occurrence.
    /// Header names compare case-insensitively, everything else exactly.
    pub fn duplicate_keys(&self) -> Vec<&str> {
        let ignore_case = self.kind() == SectionKind::Headers;
        let same = |a: &str, b: &str| {
            if ignore_case {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        };
        let mut duplicates: Vec<&str> = Vec::new();

        for (index, entry) in self.entries.iter().enumerate() {
            let seen_before = self.entries[..index].iter().any(|e| same(&e.key, &entry.key));
            if seen_before && !duplicates.iter().any(|d| same(d, &entry.key)) {
                duplicates.push(entry.key.as_str());
            }
        }

        duplicates
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ConfigDocument {
    pub dialect: Dialect,
    pub sections: Vec<Section>,
}

impl ConfigDocument {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sections: Vec::new(),
        }
    }

    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(move |s| s.kind() == kind)
    }

    /// Renders the document as text. Every value is quoted so that the parser
    /// reads back exactly the stored string.
    pub fn to_text(&self) -> String {
        let mut text = String::new();

        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 {
                text.push('\n');
            }
            text.push_str(&section.header_line());
            text.push('\n');
            for entry in &section.entries {
                text.push_str(&entry.key);
                text.push_str(" = ");
                text.push_str(&quote(&entry.value));
                text.push('\n');
            }
        }

        text
    }
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
