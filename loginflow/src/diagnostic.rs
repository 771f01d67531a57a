use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Points a diagnostic at the offending part of a configuration document.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Location {
    pub section: String,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new<S: Into<String>>(severity: Severity, message: S) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn in_section<S: Into<String>>(mut self, section: S) -> Self {
        self.location = Some(Location {
            section: section.into(),
            key: None,
        });
        self
    }

    pub fn at_key<S1: Into<String>, S2: Into<String>>(mut self, section: S1, key: S2) -> Self {
        self.location = Some(Location {
            section: section.into(),
            key: Some(key.into()),
        });
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;

        match &self.location {
            Some(Location {
                section,
                key: Some(key),
            }) => write!(f, " ({} / {})", section, key),
            Some(Location { section, key: None }) => write!(f, " ({})", section),
            None => Ok(()),
        }
    }
}

/// Highest severity in the list, `None` when the list is empty.
pub fn max_severity(diagnostics: &[Diagnostic]) -> Option<Severity> {
    diagnostics.iter().map(|d| d.severity).max()
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    max_severity(diagnostics) == Some(Severity::Error)
}

pub fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_are_ordered() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn max_severity_of_mixed_list() {
        let diagnostics = vec![
            Diagnostic::info("a"),
            Diagnostic::warning("b"),
            Diagnostic::info("c"),
        ];

        assert_eq!(max_severity(&diagnostics), Some(Severity::Warning));
        assert!(!has_errors(&diagnostics));
        assert_eq!(max_severity(&[]), None);
    }

    #[test]
    fn display_includes_location() {
        let diagnostic = Diagnostic::error("duplicate key").at_key("Headers", "Accept");

        assert_eq!(
            diagnostic.to_string(),
            "error: duplicate key (Headers / Accept)"
        );
    }
}
