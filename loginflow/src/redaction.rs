use crate::data::{Headers, RequestBody, RequestData, ResponseData};
use regex::Regex;

/// One scrubbing rule applied to every kept exchange.
#[derive(Debug)]
pub enum Redaction {
    /// Header names, lowercased.
    DropHeaders(Vec<String>),
    DropHeadersMatching(Vec<Regex>),
    ReplaceText { secret: String, substitution: String },
    /// The substitution may use `$1`-style group references.
    ReplaceMatching { pattern: Regex, substitution: String },
}

impl Redaction {
    pub fn apply_to_request(&self, request_data: &mut RequestData) {
        self.scrub_headers(&mut request_data.headers);
        match &mut request_data.body {
            Some(RequestBody::Raw(body)) => self.scrub_text(body),
            Some(RequestBody::Fields(fields)) => {
                fields.iter_mut().for_each(|(_, value)| self.scrub_text(value))
            }
            None => {}
        }
    }

    pub fn apply_to_response(&self, response_data: &mut ResponseData) {
        self.scrub_headers(&mut response_data.headers);
        self.scrub_text(&mut response_data.body);
    }

    fn scrub_headers(&self, headers: &mut Headers) {
        match self {
            Redaction::DropHeaders(names) => {
                headers.retain(|(key, _)| !names.contains(&key.to_lowercase()))
            }
            Redaction::DropHeadersMatching(patterns) => {
                headers.retain(|(key, _)| !patterns.iter().any(|p| p.is_match(key)))
            }
            _ => {}
        }
    }

    fn scrub_text(&self, text: &mut String) {
        match self {
            Redaction::ReplaceText {
                secret,
                substitution,
            } if !secret.is_empty() && text.contains(secret.as_str()) => {
                *text = text.replace(secret.as_str(), substitution);
            }
            Redaction::ReplaceMatching {
                pattern,
                substitution,
            } => {
                let replaced = pattern.replace_all(text, substitution.as_str()).into_owned();
                *text = replaced;
            }
            _ => {}
        }
    }
}

/// Collects redactions for one side of the exchange, in registration order.
#[derive(Debug, Default)]
pub struct RedactionBuilder {
    redactions: Vec<Redaction>,
}

impl RedactionBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn remove_headers<S: Into<String>, I: IntoIterator<Item = S>>(
        &mut self,
        headers: I,
    ) -> &mut Self {
        let names = headers.into_iter().map(|h| h.into().to_lowercase()).collect();
        self.push(Redaction::DropHeaders(names))
    }

    pub fn remove_headers_regex<I: IntoIterator<Item = Regex>>(&mut self, patterns: I) -> &mut Self {
        self.push(Redaction::DropHeadersMatching(patterns.into_iter().collect()))
    }

    pub fn body_replace<S1: Into<String>, S2: Into<String>>(
        &mut self,
        secret: S1,
        substitution: S2,
    ) -> &mut Self {
        self.push(Redaction::ReplaceText {
            secret: secret.into(),
            substitution: substitution.into(),
        })
    }

    pub fn body_replace_regex<S: Into<String>>(
        &mut self,
        pattern: Regex,
        substitution: S,
    ) -> &mut Self {
        self.push(Redaction::ReplaceMatching {
            pattern,
            substitution: substitution.into(),
        })
    }

    pub(crate) fn finish(self) -> Vec<Redaction> {
        self.redactions
    }

    fn push(&mut self, redaction: Redaction) -> &mut Self {
        self.redactions.push(redaction);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RequestData {
        RequestData {
            url: String::from("https://x/login"),
            method: String::from("POST"),
            headers: vec![
                (String::from("Cookie"), String::from("sid=abc")),
                (String::from("Accept"), String::from("*/*")),
            ],
            body: Some(RequestBody::Fields(vec![
                (String::from("user"), String::from("alice")),
                (String::from("pass"), String::from("hunter2")),
            ])),
        }
    }

    fn redact(build: impl FnOnce(&mut RedactionBuilder) -> &mut RedactionBuilder) -> RequestData {
        let mut builder = RedactionBuilder::new();
        build(&mut builder);
        let mut request_data = request();
        for redaction in builder.finish() {
            redaction.apply_to_request(&mut request_data);
        }
        request_data
    }

    #[test]
    fn removes_headers_regardless_of_case() {
        let request_data = redact(|r| r.remove_headers(vec!["COOKIE"]));

        assert_eq!(
            request_data.headers,
            vec![(String::from("Accept"), String::from("*/*"))]
        );
    }

    #[test]
    fn header_patterns_match_the_captured_spelling() {
        let request_data = redact(|r| r.remove_headers_regex(vec![Regex::new("^Acc").unwrap()]));

        assert_eq!(request_data.headers.len(), 1);
        assert_eq!(request_data.headers[0].0, "Cookie");
    }

    #[test]
    fn body_replace_applies_to_each_field_value() {
        let request_data = redact(|r| r.body_replace("hunter2", "<redacted>").body_replace("", "x"));

        assert_eq!(request_data.fields()[0].1, "alice");
        assert_eq!(request_data.fields()[1].1, "<redacted>");
    }

    #[test]
    fn response_body_regex_replace_with_groups() {
        let mut builder = RedactionBuilder::new();
        builder.body_replace_regex(Regex::new(r"(sid)=[a-z0-9]+").unwrap(), "$1=***");
        let mut response_data = ResponseData {
            status_code: 200,
            headers: vec![(String::from("Set-Cookie"), String::from("sid=deadbeef"))],
            body: String::from("your sid=deadbeef expires, old sid=cafe"),
        };

        for redaction in builder.finish() {
            redaction.apply_to_response(&mut response_data);
        }

        assert_eq!(response_data.body, "your sid=*** expires, old sid=***");
        assert_eq!(response_data.headers.len(), 1);
    }
}
