use crate::{
    config::{
        self,
        document::{ConfigDocument, Dialect, Section, SectionKind},
    },
    diagnostic::{Diagnostic, Severity},
    error::Error,
    flow::{PASS_MARKER, USER_MARKER},
};
use tracing::debug;

/// Message of the terminal `info` diagnostic appended to a clean report.
pub const STRUCTURALLY_VALID: &str = "configuration document is structurally valid";

/// Runs the structural checks in fixed order, one diagnostic per failed check:
///
/// 1. a request section exists and every request section declares `url` and `method`
/// 2. a data section exists and holds at least one key
/// 3. the data sections mention both `<USER>` and `<PASS>`
/// 4. no headers section repeats a header name
/// 5. no other section repeats a key
///
/// When none of them fails, a single `info` diagnostic with [`STRUCTURALLY_VALID`]
/// is appended. An empty list never means "valid".
pub fn validate(document: &ConfigDocument) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    diagnostics.extend(check_request_section(document));
    diagnostics.extend(check_data_section(document));
    diagnostics.extend(check_placeholders(document));
    diagnostics.extend(check_duplicate_headers(document));
    diagnostics.extend(check_duplicate_keys(document));

    let clean = diagnostics
        .iter()
        .all(|d| d.severity == Severity::Info);
    if clean {
        diagnostics.push(Diagnostic::info(STRUCTURALLY_VALID));
    }
    debug!(
        dialect = %document.dialect,
        findings = diagnostics.len(),
        clean,
        "validated configuration document"
    );

    diagnostics
}

/// Parses `text` and validates the result. Fails only when the text cannot be parsed at all.
pub fn validate_text(text: &str, dialect_hint: Option<Dialect>) -> Result<Vec<Diagnostic>, Error> {
    let parsed = config::parse(text, dialect_hint)?;

    Ok(validate(&parsed.document))
}

pub fn is_structurally_valid(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.severity == Severity::Info && d.message == STRUCTURALLY_VALID)
}

fn section_name(document: &ConfigDocument, kind: SectionKind) -> &'static str {
    document.dialect.section_name(kind).unwrap_or_default()
}

fn check_request_section(document: &ConfigDocument) -> Option<Diagnostic> {
    let name = section_name(document, SectionKind::Request);
    let mut requests = document.sections_of(SectionKind::Request).peekable();

    if requests.peek().is_none() {
        return Some(
            Diagnostic::error(format!(
                "missing request section [[{}]] declaring url and method",
                name
            ))
            .in_section(name),
        );
    }

    requests.enumerate().find_map(|(index, section)| {
        let missing = ["url", "method"]
            .iter()
            .copied()
            .filter(|key| section.get(key).map_or(true, |v| v.trim().is_empty()))
            .collect::<Vec<_>>();

        if missing.is_empty() {
            None
        } else {
            Some(
                Diagnostic::error(format!(
                    "request section {} (#{}) does not declare {}",
                    section.header_line(),
                    index + 1,
                    missing.join(" and ")
                ))
                .at_key(section.name.clone(), missing[0]),
            )
        }
    })
}

fn check_data_section(document: &ConfigDocument) -> Option<Diagnostic> {
    let name = section_name(document, SectionKind::Data);
    let mut data = document.sections_of(SectionKind::Data).peekable();

    if data.peek().is_none() {
        return Some(
            Diagnostic::error(format!("missing data section [{}]", name)).in_section(name),
        );
    }

    if data.all(Section::is_empty) {
        return Some(
            Diagnostic::error(format!("data section [{}] has no keys", name)).in_section(name),
        );
    }

    None
}

fn check_placeholders(document: &ConfigDocument) -> Option<Diagnostic> {
    let entries = document
        .sections_of(SectionKind::Data)
        .flat_map(|s| s.entries.iter())
        .collect::<Vec<_>>();

    // Without data there is nothing to inspect; the data check already reported it.
    if entries.is_empty() {
        return None;
    }

    let mentions = |marker: &str| {
        entries
            .iter()
            .any(|e| e.value.contains(marker) || e.key.contains(marker))
    };
    let missing = [USER_MARKER, PASS_MARKER]
        .iter()
        .copied()
        .filter(|marker| !mentions(marker))
        .collect::<Vec<_>>();

    if missing.is_empty() {
        None
    } else {
        let name = section_name(document, SectionKind::Data);
        Some(
            Diagnostic::error(format!(
                "data section [{}] lacks the credential placeholder {}",
                name,
                missing.join(" and ")
            ))
            .in_section(name),
        )
    }
}

fn check_duplicate_headers(document: &ConfigDocument) -> Option<Diagnostic> {
    first_duplicate(document.sections_of(SectionKind::Headers)).map(|(section, keys)| {
        Diagnostic::error(format!(
            "headers section {} repeats {}",
            section.header_line(),
            quote_keys(&keys)
        ))
        .at_key(section.name.clone(), keys[0])
    })
}

fn check_duplicate_keys(document: &ConfigDocument) -> Option<Diagnostic> {
    let sections = document
        .sections
        .iter()
        .filter(|s| s.kind() != SectionKind::Headers);

    first_duplicate(sections).map(|(section, keys)| {
        Diagnostic::error(format!(
            "section {} repeats {}",
            section.header_line(),
            quote_keys(&keys)
        ))
        .at_key(section.name.clone(), keys[0])
    })
}

fn first_duplicate<'a, I: Iterator<Item = &'a Section>>(
    sections: I,
) -> Option<(&'a Section, Vec<&'a str>)> {
    sections
        .map(|s| (s, s.duplicate_keys()))
        .find(|(_, keys)| !keys.is_empty())
}

fn quote_keys(keys: &[&str]) -> String {
    keys.iter()
        .map(|k| format!("`{}`", k))
        .collect::<Vec<_>>()
        .join(", ")
}
