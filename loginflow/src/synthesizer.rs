use crate::{
    config::document::{ConfigDocument, Dialect, Section, SectionKind},
    diagnostic::Diagnostic,
    flow::{FlowStep, LoginFlow},
};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedConfig {
    pub document: ConfigDocument,
    pub diagnostics: Vec<Diagnostic>,
}

impl SynthesizedConfig {
    pub fn to_text(&self) -> String {
        self.document.to_text()
    }
}

/// Builds a configuration document with one request section per step, each followed
/// by its data, headers and (where the dialect allows it) token capture sections.
///
/// The output depends only on `flow` and `dialect`.
pub fn synthesize(flow: &LoginFlow, dialect: Dialect) -> SynthesizedConfig {
    let mut document = ConfigDocument::new(dialect);
    let mut diagnostics = Vec::new();

    if flow.steps.is_empty() {
        diagnostics.push(Diagnostic::warning(
            "the flow has no steps, the document has no request section",
        ));
    }

    for (index, step) in flow.steps.iter().enumerate() {
        document
            .sections
            .push(request_section(step, dialect, &mut diagnostics));

        let mut data = section(dialect, SectionKind::Data);
        for field in &step.fields {
            push_entry(
                &mut data,
                &field.name,
                &field.binding.to_config_value(),
                &mut diagnostics,
            );
        }
        report_repeated_keys(&data, index, &mut diagnostics);
        if !data.is_empty() {
            document.sections.push(data);
        }

        let mut headers = section(dialect, SectionKind::Headers);
        for (name, value) in &step.headers {
            push_entry(&mut headers, name, value, &mut diagnostics);
        }
        report_repeated_keys(&headers, index, &mut diagnostics);
        if !headers.is_empty() {
            document.sections.push(headers);
        }

        match dialect.section_name(SectionKind::Tokens) {
            Some(name) => {
                let mut capture = Section::new(name, false);
                for token in flow.tokens_from(index) {
                    push_entry(
                        &mut capture,
                        &token.name,
                        &token.rule.to_string(),
                        &mut diagnostics,
                    );
                }
                if !capture.is_empty() {
                    document.sections.push(capture);
                }
            }
            None => {
                for token in flow.tokens_from(index) {
                    diagnostics.push(Diagnostic::info(format!(
                        "{} cannot express extraction rules, dropped token `{}` ({}) of step {}",
                        dialect,
                        token.name,
                        token.rule,
                        index + 1
                    )));
                }
            }
        }
    }

    debug!(
        %dialect,
        sections = document.sections.len(),
        "synthesized configuration document"
    );

    SynthesizedConfig {
        document,
        diagnostics,
    }
}

/// Repeated form fields (checkbox groups and the like) are written as captured, which the
/// validator rejects as duplicate keys.
fn report_repeated_keys(section: &Section, step: usize, diagnostics: &mut Vec<Diagnostic>) {
    for key in section.duplicate_keys() {
        diagnostics.push(
            Diagnostic::warning(format!(
                "step {} repeats `{}` in {}, the document will not validate",
                step + 1,
                key,
                section.header_line()
            ))
            .at_key(section.name.clone(), key),
        );
    }
}

fn section(dialect: Dialect, kind: SectionKind) -> Section {
    Section::new(dialect.section_name(kind).unwrap_or_default(), false)
}

fn request_section(
    step: &FlowStep,
    dialect: Dialect,
    diagnostics: &mut Vec<Diagnostic>,
) -> Section {
    let mut request = Section::new(
        dialect
            .section_name(SectionKind::Request)
            .unwrap_or_default(),
        true,
    );

    push_entry(&mut request, "url", &step.url, diagnostics);
    push_entry(&mut request, "method", &step.method, diagnostics);
    if let Some((expect, location)) = step.follow_up.to_config_values() {
        push_entry(&mut request, "expect", expect, diagnostics);
        if let Some(location) = location {
            push_entry(&mut request, "location", location, diagnostics);
        }
    }

    request
}

/// Adds an entry unless the key cannot be written on a `key = value` line.
/// Line breaks inside values become spaces.
fn push_entry(section: &mut Section, key: &str, value: &str, diagnostics: &mut Vec<Diagnostic>) {
    let key = key.trim();
    let unwritable = key.is_empty()
        || key.contains('=')
        || key.contains('\n')
        || key.contains('\r')
        || key.starts_with('[')
        || key.starts_with('#')
        || key.starts_with(';');

    if unwritable {
        diagnostics.push(
            Diagnostic::warning(format!("key `{}` cannot be written, entry dropped", key))
                .in_section(section.name.clone()),
        );
        return;
    }

    if value.contains('\n') || value.contains('\r') {
        diagnostics.push(
            Diagnostic::warning("line breaks in value replaced by spaces")
                .at_key(section.name.clone(), key),
        );
        section.push(
            key,
            value
                .replace("\r\n", " ")
                .replace(|c: char| c == '\r' || c == '\n', " "),
        );
    } else {
        section.push(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config,
        diagnostic::{self, Severity},
        flow::{Binding, ExtractionRule, FieldBinding, FollowUp, StepOrigin, TokenRequirement},
    };

    fn sample_flow() -> LoginFlow {
        let mut flow = LoginFlow::new();
        flow.steps
            .push(FlowStep::new("https://x/login", "GET", StepOrigin::Trace));

        let mut submit = FlowStep::new("https://x/login", "POST", StepOrigin::Trace);
        submit.fields.push(FieldBinding::new("user", Binding::Username));
        submit.fields.push(FieldBinding::new("pass", Binding::Password));
        submit.fields.push(FieldBinding::new(
            "csrf_token",
            Binding::Token(String::from("csrf_token")),
        ));
        submit.fields.push(FieldBinding::new(
            "note",
            Binding::Literal(String::from(r#"a "quoted" \ value"#)),
        ));
        submit.headers.push((
            String::from("Content-Type"),
            String::from("application/x-www-form-urlencoded"),
        ));
        submit.require("csrf_token");
        submit.follow_up = FollowUp::Redirect(String::from("https://x/home"));
        flow.steps.push(submit);

        flow.add_token(TokenRequirement {
            name: String::from("csrf_token"),
            source_step: 0,
            rule: ExtractionRule::HiddenField(String::from("csrf_token")),
        });
        flow
    }

    #[test]
    fn openbullet_layout_and_lost_token_rule() {
        let synthesized = synthesize(&sample_flow(), Dialect::OpenBullet);

        assert_eq!(
            synthesized.to_text(),
            "[[Requests]]\n\
             url = \"https://x/login\"\n\
             method = \"GET\"\n\
             \n\
             [[Requests]]\n\
             url = \"https://x/login\"\n\
             method = \"POST\"\n\
             expect = \"redirect\"\n\
             location = \"https://x/home\"\n\
             \n\
             [Data]\n\
             user = \"<USER>\"\n\
             pass = \"<PASS>\"\n\
             csrf_token = \"<TOKEN:csrf_token>\"\n\
             note = \"a \\\"quoted\\\" \\\\ value\"\n\
             \n\
             [Headers]\n\
             Content-Type = \"application/x-www-form-urlencoded\"\n"
        );
        assert_eq!(synthesized.diagnostics.len(), 1);
        assert_eq!(synthesized.diagnostics[0].severity, Severity::Info);
        assert!(synthesized.diagnostics[0].message.contains("csrf_token"));
    }

    #[test]
    fn silverbullet_keeps_token_rules() {
        let synthesized = synthesize(&sample_flow(), Dialect::SilverBullet);
        let document = &synthesized.document;

        assert!(synthesized.diagnostics.is_empty());
        assert_eq!(document.sections[0].name, "Request");
        assert_eq!(document.sections[1].name, "Capture");
        assert_eq!(
            document.sections[1].get("csrf_token"),
            Some("hidden:csrf_token")
        );
        assert_eq!(document.sections[3].name, "Payload");
    }

    #[test]
    fn output_is_deterministic() {
        let flow = sample_flow();

        for dialect in [Dialect::OpenBullet, Dialect::SilverBullet].iter() {
            assert_eq!(
                synthesize(&flow, *dialect).to_text(),
                synthesize(&flow, *dialect).to_text()
            );
        }
    }

    #[test]
    fn parsing_the_text_reproduces_the_document() {
        let flow = sample_flow();
        let synthesized = synthesize(&flow, Dialect::SilverBullet);

        let parsed = config::parse(&synthesized.to_text(), None).unwrap();

        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.document, synthesized.document);
    }

    #[test]
    fn unwritable_keys_and_line_breaks_are_reported() {
        let mut flow = LoginFlow::new();
        let mut step = FlowStep::new("https://x/login", "POST", StepOrigin::Trace);
        step.fields
            .push(FieldBinding::new("a=b", Binding::Literal(String::from("1"))));
        step.fields.push(FieldBinding::new(
            "msg",
            Binding::Literal(String::from("line one\r\nline two")),
        ));
        flow.steps.push(step);

        let synthesized = synthesize(&flow, Dialect::OpenBullet);

        assert_eq!(diagnostic::count(&synthesized.diagnostics, Severity::Warning), 2);
        assert_eq!(
            synthesized.document.sections[1].get("msg"),
            Some("line one line two")
        );
        assert_eq!(synthesized.document.sections[1].entries.len(), 1);
    }

    #[test]
    fn repeated_fields_are_reported_before_validation() {
        let mut flow = LoginFlow::new();
        let mut step = FlowStep::new("https://x/login", "POST", StepOrigin::Trace);
        step.fields.push(FieldBinding::new("user", Binding::Username));
        step.fields.push(FieldBinding::new("pass", Binding::Password));
        step.fields
            .push(FieldBinding::new("role", Binding::Literal(String::from("a"))));
        step.fields
            .push(FieldBinding::new("role", Binding::Literal(String::from("b"))));
        flow.steps.push(step);

        let synthesized = synthesize(&flow, Dialect::OpenBullet);

        assert_eq!(synthesized.diagnostics.len(), 1);
        assert_eq!(synthesized.diagnostics[0].severity, Severity::Warning);
        assert!(synthesized.diagnostics[0].message.contains("`role`"));
        assert_eq!(
            synthesized.diagnostics[0]
                .location
                .as_ref()
                .and_then(|l| l.key.as_deref()),
            Some("role")
        );

        let validated = crate::validator::validate(&synthesized.document);
        assert_eq!(diagnostic::count(&validated, Severity::Error), 1);
    }

    #[test]
    fn empty_flow_is_flagged() {
        let synthesized = synthesize(&LoginFlow::new(), Dialect::OpenBullet);

        assert!(synthesized.document.sections.is_empty());
        assert_eq!(synthesized.diagnostics[0].severity, Severity::Warning);
    }
}
