pub mod document;

use crate::{diagnostic::Diagnostic, error::Error};
use document::{ConfigDocument, Dialect, Section, SectionKind};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref SECTION_REGEX: Regex = Regex::new(
        r"^\[(?P<open>\[)?\s*(?P<name>[^\[\]]+?)\s*\](?P<close>\])?$"
    )
    .unwrap();
}

/// A parsed document plus the recoverable defects found while reading it.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub document: ConfigDocument,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses configuration text.
///
/// `dialect_hint` wins when given; otherwise the dialect is detected from the section
/// names, falling back to OpenBullet when no dialect-specific name appears.
///
/// Fails with [`Error::Syntax`] for an unterminated section header, a `key = value`
/// line before any section, a line that is neither, or an unterminated quoted value.
/// Duplicate keys are reported as error diagnostics and parsing continues.
pub fn parse(text: &str, dialect_hint: Option<Dialect>) -> Result<ParsedConfig, Error> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut sections: Vec<Section> = Vec::new();
    let mut diagnostics = Vec::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            sections.push(parse_section_header(line, line_number)?);
            continue;
        }

        let section = sections.last_mut().ok_or_else(|| {
            Error::syntax(line_number, "key/value line outside any section")
        })?;

        let separator = line
            .find('=')
            .ok_or_else(|| Error::syntax(line_number, "expected `key = value`"))?;
        let key = line[..separator].trim();
        if key.is_empty() {
            return Err(Error::syntax(line_number, "empty key"));
        }
        let value = parse_value(line[separator + 1..].trim(), line_number)?;

        let ignore_case = section.kind() == SectionKind::Headers;
        let duplicate = section.entries.iter().any(|e| {
            if ignore_case {
                e.key.eq_ignore_ascii_case(key)
            } else {
                e.key == key
            }
        });
        if duplicate {
            diagnostics.push(
                Diagnostic::error(format!(
                    "duplicate key `{}` in section {} at line {}",
                    key,
                    section.header_line(),
                    line_number
                ))
                .at_key(section.name.clone(), key),
            );
        }

        section.push(key, value);
    }

    let dialect = resolve_dialect(&sections, dialect_hint, &mut diagnostics);
    debug!(
        %dialect,
        sections = sections.len(),
        defects = diagnostics.len(),
        "parsed configuration document"
    );

    Ok(ParsedConfig {
        document: ConfigDocument { dialect, sections },
        diagnostics,
    })
}

fn parse_section_header(line: &str, line_number: usize) -> Result<Section, Error> {
    let captures = SECTION_REGEX
        .captures(line)
        .ok_or_else(|| Error::syntax(line_number, "unterminated section header"))?;

    let repeated = match (captures.name("open"), captures.name("close")) {
        (Some(_), Some(_)) => true,
        (None, None) => false,
        _ => {
            return Err(Error::syntax(
                line_number,
                "unbalanced brackets in section header",
            ))
        }
    };

    Ok(Section::new(&captures["name"], repeated))
}

/// Unquotes a value. Inside quotes `\"` and `\\` are escapes; any other
/// backslash is kept as written.
fn parse_value(raw: &str, line_number: usize) -> Result<String, Error> {
    if !raw.starts_with('"') {
        return Ok(String::from(raw));
    }

    let mut value = String::with_capacity(raw.len());
    let mut chars = raw[1..].chars();

    loop {
        match chars.next() {
            None => return Err(Error::syntax(line_number, "unterminated quoted value")),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('"') => value.push('"'),
                Some('\\') => value.push('\\'),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return Err(Error::syntax(line_number, "unterminated quoted value")),
            },
            Some(c) => value.push(c),
        }
    }

    if !chars.as_str().trim().is_empty() {
        return Err(Error::syntax(
            line_number,
            "unexpected text after quoted value",
        ));
    }

    Ok(value)
}

fn resolve_dialect(
    sections: &[Section],
    hint: Option<Dialect>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Dialect {
    let mut markers = sections
        .iter()
        .filter_map(|s| SectionKind::classify(&s.name).1);
    let detected = markers.next();

    if let Some(first) = detected {
        if markers.any(|d| d != first) {
            diagnostics.push(Diagnostic::warning(format!(
                "document mixes OpenBullet and SilverBullet section names, treating it as {}",
                hint.unwrap_or(first)
            )));
        }
    }

    match (hint, detected) {
        (Some(hint), Some(detected)) if hint != detected => {
            diagnostics.push(Diagnostic::warning(format!(
                "dialect hint {} contradicts the detected {} section names",
                hint, detected
            )));
            hint
        }
        (Some(hint), _) => hint,
        (None, Some(detected)) => detected,
        (None, None) => Dialect::OpenBullet,
    }
}
