#[cfg(test)]
mod tests {
    use loginflow::{
        loginflow_fixture_test, Binding, Dialect, Error, ExtractionRule, FlowSession, FollowUp,
        InputFile, SessionConfiguration, SessionReport, Severity, StepOrigin, TraceError,
    };

    fn fixture(name: &str) -> InputFile {
        InputFile::read(format!("{}/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)).unwrap()
    }

    fn run(names: &[&str]) -> SessionReport {
        let inputs = names.iter().map(|name| fixture(name)).collect();

        FlowSession::run(&SessionConfiguration::new(), inputs).unwrap()
    }

    fn redact_user_agent(config: &mut SessionConfiguration) {
        config.add_request_redactions(|r| {
            r.remove_headers(vec!["user-agent"])
                .body_replace("hunter2", "<redacted>")
        });
    }

    fn only_account_pages(config: &mut SessionConfiguration) {
        config.ingest_mut().set_login_keywords(vec!["account"]);
    }

    #[loginflow_fixture_test("fixtures/login.har")]
    fn trace_yields_ordered_steps_and_tokens(report: SessionReport) {
        let flow = &report.flow;

        assert!(report.diagnostics.is_empty());
        assert!(flow.complete);
        assert_eq!(flow.steps.len(), 2);
        assert_eq!(flow.steps[0].method, "GET");
        assert_eq!(flow.steps[1].method, "POST");
        assert!(flow.steps.iter().all(|s| s.origin == StepOrigin::Trace));

        assert_eq!(
            flow.token("csrf_token").unwrap().rule,
            ExtractionRule::HiddenField(String::from("csrf_token"))
        );
        assert_eq!(
            flow.token("session_id").unwrap().rule,
            ExtractionRule::Cookie(String::from("session_id"))
        );
        assert!(flow.tokens.iter().all(|t| t.source_step == 0));

        let submit = &flow.steps[1];
        assert_eq!(
            submit.field("email"),
            Some(&Binding::Literal(String::from("alice@example.com")))
        );
        assert_eq!(
            submit.field("csrf_token"),
            Some(&Binding::Token(String::from("csrf_token")))
        );
        assert_eq!(submit.requires, vec!["csrf_token", "session_id"]);
        assert_eq!(
            submit.follow_up,
            FollowUp::Redirect(String::from("https://shop.example/account"))
        );
        assert!(submit
            .headers
            .iter()
            .all(|(name, _)| name != "Cookie" && name != "Host" && name != "Content-Length"));
    }

    #[loginflow_fixture_test("fixtures/login.har", redact_user_agent)]
    fn redactions_scrub_the_trace(report: SessionReport) {
        let submit = &report.flow.steps[1];

        assert!(report
            .flow
            .steps
            .iter()
            .all(|s| s.headers.iter().all(|(name, _)| name != "User-Agent")));
        assert_eq!(
            submit.field("password"),
            Some(&Binding::Literal(String::from("<redacted>")))
        );
    }

    #[loginflow_fixture_test("fixtures/login.har", only_account_pages)]
    fn keywords_decide_relevance(report: SessionReport) {
        assert_eq!(report.flow.steps.len(), 1);
        assert_eq!(report.flow.steps[0].url, "https://shop.example/account");
        assert!(report.flow.tokens.is_empty());
    }

    #[loginflow_fixture_test("fixtures/openbullet.loli")]
    fn openbullet_placeholders_become_credentials(report: SessionReport) {
        let step = &report.flow.steps[0];

        assert_eq!(report.flow.steps.len(), 1);
        assert_eq!(step.origin, StepOrigin::Config);
        assert_eq!(step.field("email"), Some(&Binding::Username));
        assert_eq!(step.field("password"), Some(&Binding::Password));
        assert_eq!(
            step.follow_up,
            FollowUp::Redirect(String::from("https://shop.example/account"))
        );

        // Nothing in the document extracts the consumed token.
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
        assert!(report.diagnostics[0].message.contains("csrf_token"));
        assert!(report.flow.complete);
    }

    #[loginflow_fixture_test("fixtures/silverbullet.sb")]
    fn silverbullet_capture_provides_tokens(report: SessionReport) {
        let flow = &report.flow;

        assert!(report.diagnostics.is_empty());
        assert!(flow.complete);
        assert_eq!(flow.steps.len(), 2);
        assert_eq!(flow.token("csrf_token").unwrap().source_step, 0);
        assert_eq!(flow.steps[1].requires, vec!["csrf_token"]);
    }

    #[test]
    fn trace_binding_wins_over_configuration() {
        let report = run(&["login.har", "openbullet.loli"]);
        let submit = &report.flow.steps[1];

        assert_eq!(report.flow.steps.len(), 2);
        assert_eq!(submit.origin, StepOrigin::Trace);
        assert_eq!(
            submit.field("email"),
            Some(&Binding::Literal(String::from("alice@example.com")))
        );
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
        assert!(report.diagnostics[0].message.contains("email"));
    }

    #[test]
    fn configuration_tokens_merge_into_trace_steps() {
        let report = run(&["login.har", "silverbullet.sb"]);

        assert_eq!(report.flow.steps.len(), 2);
        assert_eq!(report.flow.tokens.len(), 2);
        assert!(report.flow.complete);
        assert_eq!(
            loginflow::count(&report.diagnostics, Severity::Warning),
            1
        );
    }

    #[test]
    fn synthesized_silverbullet_validates_cleanly() {
        let report = run(&["silverbullet.sb"]);
        let synthesized = loginflow::synthesize(&report.flow, Dialect::SilverBullet);

        assert!(synthesized.diagnostics.is_empty());

        let text = synthesized.to_text();
        let diagnostics = loginflow::validate_text(&text, None).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(loginflow::is_structurally_valid(&diagnostics));

        let reparsed = loginflow::parse(&text, None).unwrap();
        assert_eq!(reparsed.document, synthesized.document);
    }

    #[test]
    fn openbullet_synthesis_reports_lost_token_rules() {
        let report = run(&["silverbullet.sb"]);
        let synthesized = loginflow::synthesize(&report.flow, Dialect::OpenBullet);

        assert_eq!(synthesized.diagnostics.len(), 1);
        assert_eq!(synthesized.diagnostics[0].severity, Severity::Info);
        assert!(!synthesized.to_text().contains("Capture"));
        assert!(loginflow::is_structurally_valid(&loginflow::validate(
            &synthesized.document
        )));
    }

    #[test]
    fn synthesis_is_deterministic() {
        let report = run(&["login.har", "silverbullet.sb"]);

        assert_eq!(
            loginflow::synthesize(&report.flow, Dialect::SilverBullet).to_text(),
            loginflow::synthesize(&report.flow, Dialect::SilverBullet).to_text()
        );
    }

    #[test]
    fn token_consumed_before_extraction_marks_flow_incomplete() {
        let parsed = loginflow::parse(
            "[[Request]]\nurl = https://x/verify\nmethod = POST\n[Payload]\ncode = <TOKEN:otp_token>\n\
             [[Request]]\nurl = https://x/challenge\nmethod = GET\n[Capture]\notp_token = header:X-OTP-Token\n",
            None,
        )
        .unwrap();

        let normalized = loginflow::normalize(&[], &[parsed.document]).unwrap();

        assert!(!normalized.flow.complete);
        assert_eq!(loginflow::count(&normalized.diagnostics, Severity::Error), 1);
        assert!(normalized.diagnostics[0].message.contains("otp_token"));
    }

    #[test]
    fn request_without_data_fails_validation_once() {
        let diagnostics = loginflow::validate_text(
            "[[Requests]]\nurl = \"https://x/login\"\nmethod = \"POST\"\n",
            Some(Dialect::OpenBullet),
        )
        .unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert!(diagnostics[0].message.contains("[Data]"));
    }

    #[test]
    fn hard_failures() {
        assert!(matches!(
            loginflow::normalize(&[], &[]),
            Err(Error::InsufficientInput)
        ));
        assert!(matches!(
            loginflow::ingest(b"<html>not a trace</html>"),
            Err(TraceError::InvalidFormat(_))
        ));
        assert!(matches!(
            loginflow::ingest(br#"{"log":{"version":"1.2"}}"#),
            Err(TraceError::MissingEntries)
        ));
        assert!(matches!(
            loginflow::parse("[Data]\nuser = a\n[[Requests]\n", None),
            Err(Error::Syntax { line: 3, .. })
        ));
    }
}
