use crate::{
    config::document::{ConfigDocument, SectionKind},
    data::{Exchange, ResponseData},
    diagnostic::{Diagnostic, Severity},
    error::Error,
    flow::{
        token_marker, Binding, ExtractionRule, FieldBinding, FlowStep, FollowUp, LoginFlow,
        StepOrigin, TokenRequirement,
    },
    util,
};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, warn};

lazy_static! {
    static ref NAMED_INPUT_SELECTOR: Selector = Selector::parse("input[name]").unwrap();
    static ref TOKEN_NAME_REGEX: Regex = Regex::new(r"(?i)csrf|token|session").unwrap();
    static ref MFA_REGEX: Regex = Regex::new(
        r"(?i)two[- ]factor|\b2fa\b|\bmfa\b|one[- ]time (?:pass(?:word|code)|code)|\botp\b|verification code"
    )
    .unwrap();
}

/// Request headers that describe the transport rather than the login step.
const TRANSIENT_HEADERS: [&str; 4] = ["cookie", "content-length", "host", "connection"];

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedFlow {
    pub flow: LoginFlow,
    pub diagnostics: Vec<Diagnostic>,
}

/// Merges trace exchanges and configuration documents into one login flow.
///
/// Trace steps keep their occurrence order. A configuration-only step is placed right
/// before the next step of the same document that matched an already known step, so each
/// document keeps its declaration order; when nothing follows it, it is appended. A step
/// present in both keeps the trace version; differing field bindings produce one warning
/// per step. Only calling this with no input at all fails.
pub fn normalize(
    exchanges: &[Exchange],
    configs: &[ConfigDocument],
) -> Result<NormalizedFlow, Error> {
    if exchanges.is_empty() && configs.is_empty() {
        return Err(Error::InsufficientInput);
    }

    let mut diagnostics = Vec::new();
    let mut flow = trace_flow(exchanges);
    debug!(
        steps = flow.steps.len(),
        tokens = flow.tokens.len(),
        "derived steps from trace"
    );

    for (document_index, document) in configs.iter().enumerate() {
        let config = config_flow(document, document_index, &mut diagnostics);
        merge(&mut flow, config, &mut diagnostics);
    }

    if flow.steps.is_empty() {
        diagnostics.push(Diagnostic::warning(
            "no login-relevant step found in the given inputs",
        ));
    }

    let mut result = finalize(flow);
    diagnostics.append(&mut result.diagnostics);
    result.diagnostics = diagnostics;

    Ok(result)
}

/// Checks the token-ordering invariant of an already built flow and marks it
/// incomplete on violation. The flow is always returned.
pub fn finalize(mut flow: LoginFlow) -> NormalizedFlow {
    let diagnostics = check_token_order(&flow);
    flow.complete = !diagnostics.iter().any(|d| d.severity == Severity::Error);

    NormalizedFlow { flow, diagnostics }
}

/// One error per token consumed by a step that runs before the token's source step,
/// one warning per token no requirement provides.
pub fn check_token_order(flow: &LoginFlow) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (index, step) in flow.steps.iter().enumerate() {
        for name in &step.requires {
            match flow.token(name) {
                Some(requirement) if requirement.source_step > index => {
                    diagnostics.push(Diagnostic::error(format!(
                        "step {} ({} {}) consumes token `{}` before step {} extracts it",
                        index + 1,
                        step.method,
                        step.url,
                        name,
                        requirement.source_step + 1
                    )));
                }
                Some(_) => {}
                None => {
                    diagnostics.push(Diagnostic::warning(format!(
                        "step {} ({} {}) consumes token `{}` that no step extracts",
                        index + 1,
                        step.method,
                        step.url,
                        name
                    )));
                }
            }
        }
    }

    diagnostics
}

fn trace_flow(exchanges: &[Exchange]) -> LoginFlow {
    let mut flow = LoginFlow::new();

    let relevant = exchanges
        .iter()
        .filter(|e| e.login_relevant)
        .collect::<Vec<_>>();

    for (index, exchange) in relevant.iter().enumerate() {
        let request = &exchange.request_data;
        let mut step = FlowStep::new(&request.url, &request.method, StepOrigin::Trace);
        step.headers = request
            .headers
            .iter()
            .filter(|(name, _)| {
                !name.starts_with(':')
                    && !TRANSIENT_HEADERS.contains(&name.to_lowercase().as_str())
            })
            .cloned()
            .collect();
        step.fields = request
            .fields()
            .iter()
            .map(|(name, value)| FieldBinding::new(name, Binding::Literal(value.clone())))
            .collect();
        step.follow_up = detect_follow_up(&exchange.response_data);
        flow.steps.push(step);

        for requirement in discover_tokens(index, &exchange.response_data) {
            debug!(
                token = %requirement.name,
                rule = %requirement.rule,
                step = index,
                "discovered token"
            );
            flow.add_token(requirement);
        }
    }

    // Token sources are only known once every response has been scanned.
    for (step, exchange) in flow.steps.iter_mut().zip(relevant.iter()) {
        bind_consumed_tokens(step, exchange, &flow.tokens);
    }

    flow
}

fn discover_tokens(step: usize, response: &ResponseData) -> Vec<TokenRequirement> {
    let mut found = Vec::new();
    let mut push = |name: &str, rule: ExtractionRule| {
        if !found.iter().any(|t: &TokenRequirement| t.name == name) {
            found.push(TokenRequirement {
                name: String::from(name),
                source_step: step,
                rule,
            });
        }
    };

    let document = Html::parse_document(&response.body);
    for input in document.select(&NAMED_INPUT_SELECTOR) {
        let element = input.value();
        let is_hidden = element
            .attr("type")
            .map_or(false, |t| t.trim().eq_ignore_ascii_case("hidden"));

        if let Some(name) = element.attr("name").map(str::trim) {
            if is_hidden && !name.is_empty() && TOKEN_NAME_REGEX.is_match(name) {
                push(name, ExtractionRule::HiddenField(String::from(name)));
            }
        }
    }

    for (header, value) in &response.headers {
        if header.eq_ignore_ascii_case("set-cookie") {
            let cookie = value.split(';').next().unwrap_or_default();
            if let Some((cookie_name, _)) = cookie.split_once('=') {
                let cookie_name = cookie_name.trim();
                if TOKEN_NAME_REGEX.is_match(cookie_name) {
                    push(cookie_name, ExtractionRule::Cookie(String::from(cookie_name)));
                }
            }
        } else if TOKEN_NAME_REGEX.is_match(header) {
            push(header.as_str(), ExtractionRule::Header(header.clone()));
        }
    }

    found
}

fn bind_consumed_tokens(step: &mut FlowStep, exchange: &Exchange, tokens: &[TokenRequirement]) {
    let is_token = |name: &str| tokens.iter().find(|t| t.name.eq_ignore_ascii_case(name));

    for field in &mut step.fields {
        if let Some(token) = is_token(&field.name) {
            field.binding = Binding::Token(token.name.clone());
        }
    }
    let mut consumed = step
        .fields
        .iter()
        .filter_map(|f| match &f.binding {
            Binding::Token(name) => Some(name.clone()),
            _ => None,
        })
        .collect::<Vec<_>>();

    for (header, value) in &exchange.request_data.headers {
        if header.eq_ignore_ascii_case("cookie") {
            for cookie in value.split(';') {
                if let Some((name, _)) = cookie.split_once('=') {
                    if let Some(token) = is_token(name.trim()) {
                        consumed.push(token.name.clone());
                    }
                }
            }
        } else if let Some(token) = is_token(header) {
            consumed.push(token.name.clone());
        }
    }

    for name in consumed {
        step.require(name);
    }
}

fn detect_follow_up(response: &ResponseData) -> FollowUp {
    if response.is_redirect() {
        if let Some(location) = response.header("location") {
            let lowered = location.to_lowercase();
            let oauth = ["oauth", "/authorize", "response_type=", "client_id="]
                .iter()
                .any(|marker| lowered.contains(marker));

            return if oauth {
                FollowUp::OAuthHop(String::from(location))
            } else {
                FollowUp::Redirect(String::from(location))
            };
        }
    }

    if MFA_REGEX.is_match(&response.body) {
        FollowUp::MfaPrompt
    } else {
        FollowUp::None
    }
}

fn config_flow(
    document: &ConfigDocument,
    document_index: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> LoginFlow {
    let mut flow = LoginFlow::new();
    let mut current: Option<usize> = None;
    let label = format!("configuration {}", document_index + 1);

    for section in &document.sections {
        let kind = section.kind();

        if kind == SectionKind::Request {
            current = None;
            let url = match section.get("url").filter(|u| !u.trim().is_empty()) {
                Some(url) => url,
                None => {
                    diagnostics.push(
                        Diagnostic::warning(format!(
                            "{}: request section without url skipped",
                            label
                        ))
                        .in_section(section.name.clone()),
                    );
                    continue;
                }
            };
            let method = match section.get("method").filter(|m| !m.trim().is_empty()) {
                Some(method) => method,
                None => {
                    diagnostics.push(
                        Diagnostic::warning(format!(
                            "{}: request to {} declares no method, assuming GET",
                            label, url
                        ))
                        .at_key(section.name.clone(), "method"),
                    );
                    "GET"
                }
            };

            let mut step = FlowStep::new(url.trim(), method.trim(), StepOrigin::Config);
            match FollowUp::from_config_values(section.get("expect"), section.get("location")) {
                Some(follow_up) => step.follow_up = follow_up,
                None => diagnostics.push(
                    Diagnostic::warning(format!(
                        "{}: unknown expectation `{}` ignored",
                        label,
                        section.get("expect").unwrap_or_default()
                    ))
                    .at_key(section.name.clone(), "expect"),
                ),
            }
            flow.steps.push(step);
            current = Some(flow.steps.len() - 1);
            continue;
        }

        let index = match (kind, current) {
            (SectionKind::Other, _) => {
                debug!(section = %section.name, "ignoring unrecognized section");
                continue;
            }
            (_, Some(index)) => index,
            (_, None) => {
                diagnostics.push(
                    Diagnostic::warning(format!(
                        "{}: section {} does not follow a request section, ignored",
                        label,
                        section.header_line()
                    ))
                    .in_section(section.name.clone()),
                );
                continue;
            }
        };

        match kind {
            SectionKind::Data => {
                let step = &mut flow.steps[index];
                for entry in &section.entries {
                    let binding = Binding::from_config_value(&entry.value);
                    if let Binding::Token(name) = &binding {
                        step.require(name.clone());
                    }
                    step.fields.push(FieldBinding::new(&entry.key, binding));
                }
            }
            SectionKind::Headers => {
                let step = &mut flow.steps[index];
                for entry in &section.entries {
                    if let Some(name) = token_marker(entry.value.trim()) {
                        step.require(name);
                    }
                    step.headers.push((entry.key.clone(), entry.value.clone()));
                }
            }
            SectionKind::Tokens => {
                for entry in &section.entries {
                    match entry.value.parse::<ExtractionRule>() {
                        Ok(rule) => {
                            flow.add_token(TokenRequirement {
                                name: entry.key.clone(),
                                source_step: index,
                                rule,
                            });
                        }
                        Err(reason) => diagnostics.push(
                            Diagnostic::warning(format!("{}: {}", label, reason))
                                .at_key(section.name.clone(), entry.key.clone()),
                        ),
                    }
                }
            }
            SectionKind::Request | SectionKind::Other => {}
        }
    }

    flow
}

/// Where an incoming configuration step ended up before the merged order is built.
#[derive(Debug, Clone, Copy)]
enum Placement {
    Existing(usize),
    Added(usize),
}

fn merge(flow: &mut LoginFlow, incoming: LoginFlow, diagnostics: &mut Vec<Diagnostic>) {
    let mut placements = Vec::with_capacity(incoming.steps.len());
    let mut added: Vec<FlowStep> = Vec::new();

    for step in incoming.steps {
        let identity = util::request_identity(&step.method, &step.url);
        let same = |s: &FlowStep| util::request_identity(&s.method, &s.url) == identity;
        let matched = match flow.steps.iter().position(same) {
            Some(position) => Some(Placement::Existing(position)),
            None => added.iter().position(same).map(Placement::Added),
        };

        match matched {
            Some(placement) => {
                let kept = match placement {
                    Placement::Existing(position) => &flow.steps[position],
                    Placement::Added(index) => &added[index],
                };
                report_binding_conflict(kept, &step, diagnostics);
                placements.push(placement);
            }
            None => {
                debug!(step = %identity, "adding configuration-only step");
                added.push(step);
                placements.push(Placement::Added(added.len() - 1));
            }
        }
    }

    // A configuration-only step goes right before the next step of its document
    // that matched an existing one; with no such step it goes last.
    let mut anchors = vec![None; added.len()];
    let mut next_existing = None;
    for placement in placements.iter().rev() {
        match *placement {
            Placement::Existing(position) => next_existing = Some(position),
            Placement::Added(index) => anchors[index] = next_existing,
        }
    }

    let existing = std::mem::take(&mut flow.steps);
    let mut moved_to = vec![0; existing.len()];
    let mut added_at = vec![0; added.len()];
    let mut pending = added.into_iter().map(Some).collect::<Vec<_>>();

    for (position, step) in existing.into_iter().enumerate() {
        for (index, slot) in pending.iter_mut().enumerate() {
            if anchors[index] == Some(position) {
                if let Some(added_step) = slot.take() {
                    added_at[index] = flow.steps.len();
                    flow.steps.push(added_step);
                }
            }
        }
        moved_to[position] = flow.steps.len();
        flow.steps.push(step);
    }
    for (index, slot) in pending.iter_mut().enumerate() {
        if let Some(added_step) = slot.take() {
            added_at[index] = flow.steps.len();
            flow.steps.push(added_step);
        }
    }

    for token in &mut flow.tokens {
        token.source_step = moved_to[token.source_step];
    }
    for mut token in incoming.tokens {
        token.source_step = match placements[token.source_step] {
            Placement::Existing(position) => moved_to[position],
            Placement::Added(index) => added_at[index],
        };
        flow.add_token(token);
    }
}

fn report_binding_conflict(kept: &FlowStep, incoming: &FlowStep, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(discrepancy) = describe_binding_conflict(kept, incoming) {
        let message = match kept.origin {
            StepOrigin::Trace => format!(
                "{} {}: trace and configuration disagree on field bindings ({}); keeping the trace",
                kept.method, kept.url, discrepancy
            ),
            StepOrigin::Config => format!(
                "{} {}: configuration documents disagree on field bindings ({}); keeping the first",
                kept.method, kept.url, discrepancy
            ),
        };
        warn!("{}", message);
        diagnostics.push(Diagnostic::warning(message));
    }
}

/// Describes field-by-field differences, `None` when both steps bind the same fields
/// to the same values. Field order alone is not a conflict.
fn describe_binding_conflict(kept: &FlowStep, incoming: &FlowStep) -> Option<String> {
    let mut differences = Vec::new();

    for field in &kept.fields {
        match incoming.field(&field.name) {
            Some(other) if *other == field.binding => {}
            Some(other) => differences.push(format!(
                "field `{}`: {} vs {}",
                field.name, field.binding, other
            )),
            None => differences.push(format!(
                "field `{}`: {} vs absent",
                field.name, field.binding
            )),
        }
    }
    for field in &incoming.fields {
        if kept.field(&field.name).is_none() {
            differences.push(format!(
                "field `{}`: absent vs {}",
                field.name, field.binding
            ));
        }
    }

    if differences.is_empty() {
        None
    } else {
        Some(differences.join("; "))
    }
}
