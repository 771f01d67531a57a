use crate::redaction::{Redaction, RedactionBuilder};

pub const DEFAULT_LOGIN_KEYWORDS: [&str; 5] = ["login", "signin", "auth", "token", "session"];
pub const DEFAULT_MAX_BODY_SNIPPET: usize = 64 * 1024;

/// Controls which trace entries survive ingestion and how they are scrubbed.
///
/// The keyword list only affects recall: an entry is kept when its URL, one of its
/// form-field names or one of its header names contains a keyword (case-insensitive).
#[derive(Debug)]
pub struct IngestConfiguration {
    login_keywords: Vec<String>,
    keep_irrelevant: bool,
    max_body_snippet: usize,
    request_redactions: Vec<Redaction>,
    response_redactions: Vec<Redaction>,
}

impl IngestConfiguration {
    pub fn new() -> Self {
        Self {
            login_keywords: DEFAULT_LOGIN_KEYWORDS
                .iter()
                .map(|k| String::from(*k))
                .collect(),
            keep_irrelevant: false,
            max_body_snippet: DEFAULT_MAX_BODY_SNIPPET,
            request_redactions: Vec::new(),
            response_redactions: Vec::new(),
        }
    }

    pub fn set_login_keywords<S: Into<String>, I: IntoIterator<Item = S>>(&mut self, keywords: I) {
        self.login_keywords = keywords
            .into_iter()
            .map(|k| k.into().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
    }

    pub fn add_login_keyword<S: Into<String>>(&mut self, keyword: S) {
        let keyword = keyword.into().to_lowercase();
        if !keyword.is_empty() && !self.login_keywords.contains(&keyword) {
            self.login_keywords.push(keyword);
        }
    }

    pub fn login_keywords(&self) -> &[String] {
        &self.login_keywords
    }

    /// Keep every entry, only flagging relevance instead of dropping unrelated ones.
    pub fn set_keep_irrelevant(&mut self, value: bool) {
        self.keep_irrelevant = value;
    }

    pub fn keep_irrelevant(&self) -> bool {
        self.keep_irrelevant
    }

    pub fn set_max_body_snippet(&mut self, max_len: usize) {
        self.max_body_snippet = max_len;
    }

    pub fn max_body_snippet(&self) -> usize {
        self.max_body_snippet
    }

    pub fn add_request_redactions<F: FnOnce(&mut RedactionBuilder) -> &mut RedactionBuilder>(
        &mut self,
        func: F,
    ) {
        let mut builder = RedactionBuilder::new();
        let _ = func(&mut builder);
        self.request_redactions.extend(builder.finish());
    }

    pub fn add_response_redactions<F: FnOnce(&mut RedactionBuilder) -> &mut RedactionBuilder>(
        &mut self,
        func: F,
    ) {
        let mut builder = RedactionBuilder::new();
        let _ = func(&mut builder);
        self.response_redactions.extend(builder.finish());
    }

    pub fn request_redactions(&self) -> &[Redaction] {
        &self.request_redactions
    }

    pub fn response_redactions(&self) -> &[Redaction] {
        &self.response_redactions
    }
}

impl Default for IngestConfiguration {
    fn default() -> Self {
        Self::new()
    }
}
