use crate::data::Headers;
use serde::Serialize;
use std::{fmt::Display, str::FromStr};

pub const USER_MARKER: &str = "<USER>";
pub const PASS_MARKER: &str = "<PASS>";
const TOKEN_MARKER_PREFIX: &str = "<TOKEN:";

/// What a form field is bound to when the flow is replayed.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Binding {
    Username,
    Password,
    /// A value extracted earlier in the flow, by token name.
    Token(String),
    Literal(String),
}

impl Binding {
    pub fn from_config_value(value: &str) -> Self {
        let trimmed = value.trim();

        if trimmed == USER_MARKER {
            Binding::Username
        } else if trimmed == PASS_MARKER {
            Binding::Password
        } else if let Some(name) = token_marker(trimmed) {
            Binding::Token(String::from(name))
        } else {
            Binding::Literal(String::from(value))
        }
    }

    pub fn to_config_value(&self) -> String {
        match self {
            Binding::Username => String::from(USER_MARKER),
            Binding::Password => String::from(PASS_MARKER),
            Binding::Token(name) => format!("{}{}>", TOKEN_MARKER_PREFIX, name),
            Binding::Literal(value) => value.clone(),
        }
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Literal(value) => write!(f, "literal `{}`", value),
            other => write!(f, "{}", other.to_config_value()),
        }
    }
}

/// Token name inside a `<TOKEN:name>` marker.
pub fn token_marker(value: &str) -> Option<&str> {
    value
        .strip_prefix(TOKEN_MARKER_PREFIX)
        .and_then(|rest| rest.strip_suffix('>'))
        .filter(|name| !name.is_empty())
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FieldBinding {
    pub name: String,
    pub binding: Binding,
}

impl FieldBinding {
    pub fn new<S: Into<String>>(name: S, binding: Binding) -> Self {
        Self {
            name: name.into(),
            binding,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum FollowUp {
    None,
    Redirect(String),
    OAuthHop(String),
    MfaPrompt,
}

impl FollowUp {
    /// `expect` / `location` pair used by configuration documents.
    pub fn to_config_values(&self) -> Option<(&'static str, Option<&str>)> {
        match self {
            FollowUp::None => None,
            FollowUp::Redirect(location) => Some(("redirect", Some(location.as_str()))),
            FollowUp::OAuthHop(location) => Some(("oauth", Some(location.as_str()))),
            FollowUp::MfaPrompt => Some(("mfa", None)),
        }
    }

    pub fn from_config_values(expect: Option<&str>, location: Option<&str>) -> Option<Self> {
        let location = String::from(location.unwrap_or_default());

        match expect.map(|e| e.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("none") => Some(FollowUp::None),
            Some("redirect") => Some(FollowUp::Redirect(location)),
            Some("oauth") => Some(FollowUp::OAuthHop(location)),
            Some("mfa") => Some(FollowUp::MfaPrompt),
            Some(_) => None,
        }
    }
}

impl Default for FollowUp {
    fn default() -> Self {
        FollowUp::None
    }
}

/// How a token's value is pulled out of the response of its source step.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ExtractionRule {
    HiddenField(String),
    Header(String),
    Cookie(String),
}

impl Display for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionRule::HiddenField(name) => write!(f, "hidden:{}", name),
            ExtractionRule::Header(name) => write!(f, "header:{}", name),
            ExtractionRule::Cookie(name) => write!(f, "cookie:{}", name),
        }
    }
}

impl FromStr for ExtractionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| format!("extraction rule `{}` has no `kind:` prefix", s))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("extraction rule `{}` has no name", s));
        }

        match kind.trim().to_lowercase().as_str() {
            "hidden" => Ok(ExtractionRule::HiddenField(String::from(name))),
            "header" => Ok(ExtractionRule::Header(String::from(name))),
            "cookie" => Ok(ExtractionRule::Cookie(String::from(name))),
            other => Err(format!("unknown extraction rule kind `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TokenRequirement {
    pub name: String,
    /// Index into [`LoginFlow::steps`] of the step whose response yields the token.
    pub source_step: usize,
    pub rule: ExtractionRule,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOrigin {
    Trace,
    Config,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FlowStep {
    pub url: String,
    pub method: String,
    pub fields: Vec<FieldBinding>,
    pub headers: Headers,
    /// Names of tokens this step sends back.
    pub requires: Vec<String>,
    pub follow_up: FollowUp,
    pub origin: StepOrigin,
}

impl FlowStep {
    pub fn new<S1: Into<String>, S2: Into<String>>(url: S1, method: S2, origin: StepOrigin) -> Self {
        Self {
            url: url.into(),
            method: method.into().to_uppercase(),
            fields: Vec::new(),
            headers: Vec::new(),
            requires: Vec::new(),
            follow_up: FollowUp::None,
            origin,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Binding> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.binding)
    }

    pub fn require<S: Into<String>>(&mut self, token: S) {
        let token = token.into();
        if !self.requires.contains(&token) {
            self.requires.push(token);
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct LoginFlow {
    pub steps: Vec<FlowStep>,
    pub tokens: Vec<TokenRequirement>,
    /// False when a token is consumed before the step that provides it.
    pub complete: bool,
}

impl LoginFlow {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            tokens: Vec::new(),
            complete: true,
        }
    }

    pub fn token(&self, name: &str) -> Option<&TokenRequirement> {
        self.tokens
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Adds `requirement` unless a token with the same name exists; the first source wins.
    pub fn add_token(&mut self, requirement: TokenRequirement) -> bool {
        if self.token(&requirement.name).is_some() {
            return false;
        }
        self.tokens.push(requirement);
        true
    }

    pub fn tokens_from(&self, step: usize) -> impl Iterator<Item = &TokenRequirement> {
        self.tokens.iter().filter(move |t| t.source_step == step)
    }
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_values_map_to_bindings() {
        assert_eq!(Binding::from_config_value("<USER>"), Binding::Username);
        assert_eq!(Binding::from_config_value(" <PASS> "), Binding::Password);
        assert_eq!(
            Binding::from_config_value("<TOKEN:csrf_token>"),
            Binding::Token(String::from("csrf_token"))
        );
        assert_eq!(
            Binding::from_config_value("<TOKEN:>"),
            Binding::Literal(String::from("<TOKEN:>"))
        );
        assert_eq!(
            Binding::Token(String::from("xsrf")).to_config_value(),
            "<TOKEN:xsrf>"
        );
    }

    #[test]
    fn extraction_rules_parse_and_print() {
        let rule: ExtractionRule = "hidden: csrf_token".parse().unwrap();

        assert_eq!(rule, ExtractionRule::HiddenField(String::from("csrf_token")));
        assert_eq!(rule.to_string(), "hidden:csrf_token");
        assert!("csrf_token".parse::<ExtractionRule>().is_err());
        assert!("body:x".parse::<ExtractionRule>().is_err());
        assert!("cookie:".parse::<ExtractionRule>().is_err());
    }

    #[test]
    fn follow_up_config_values() {
        assert_eq!(
            FollowUp::from_config_values(Some("Redirect"), Some("/home")),
            Some(FollowUp::Redirect(String::from("/home")))
        );
        assert_eq!(
            FollowUp::from_config_values(None, None),
            Some(FollowUp::None)
        );
        assert_eq!(FollowUp::from_config_values(Some("teleport"), None), None);
        assert_eq!(FollowUp::MfaPrompt.to_config_values(), Some(("mfa", None)));
    }

    #[test]
    fn first_token_source_wins() {
        let mut flow = LoginFlow::new();

        assert!(flow.add_token(TokenRequirement {
            name: String::from("csrf"),
            source_step: 0,
            rule: ExtractionRule::HiddenField(String::from("csrf")),
        }));
        assert!(!flow.add_token(TokenRequirement {
            name: String::from("CSRF"),
            source_step: 1,
            rule: ExtractionRule::Header(String::from("X-CSRF")),
        }));
        assert_eq!(flow.tokens.len(), 1);
        assert_eq!(flow.token("csrf").unwrap().source_step, 0);
    }
}
