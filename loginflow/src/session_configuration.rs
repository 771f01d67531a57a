use crate::{
    config::document::Dialect,
    generator::FlowGenerator,
    ingest_configuration::IngestConfiguration,
    redaction::RedactionBuilder,
};
use std::sync::Arc;

/// Everything a [`FlowSession`](crate::FlowSession) needs besides its input files.
#[derive(Debug, Default)]
pub struct SessionConfiguration {
    ingest: IngestConfiguration,
    dialect_hint: Option<Dialect>,
    generator: Option<Arc<dyn FlowGenerator + Send + Sync>>,
}

impl SessionConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&self) -> &IngestConfiguration {
        &self.ingest
    }

    pub fn ingest_mut(&mut self) -> &mut IngestConfiguration {
        &mut self.ingest
    }

    /// Overrides the dialect derived from the file extension of every configuration input.
    pub fn set_dialect_hint(&mut self, dialect: Dialect) {
        self.dialect_hint = Some(dialect);
    }

    pub fn dialect_hint(&self) -> Option<Dialect> {
        self.dialect_hint
    }

    pub fn set_generator(&mut self, generator: Arc<dyn FlowGenerator + Send + Sync>) {
        self.generator = Some(generator);
    }

    pub fn generator(&self) -> Option<Arc<dyn FlowGenerator + Send + Sync>> {
        self.generator.clone()
    }

    pub fn add_login_keyword<S: Into<String>>(&mut self, keyword: S) {
        self.ingest.add_login_keyword(keyword);
    }

    pub fn add_request_redactions<F: FnOnce(&mut RedactionBuilder) -> &mut RedactionBuilder>(
        &mut self,
        func: F,
    ) {
        self.ingest.add_request_redactions(func);
    }

    pub fn add_response_redactions<F: FnOnce(&mut RedactionBuilder) -> &mut RedactionBuilder>(
        &mut self,
        func: F,
    ) {
        self.ingest.add_response_redactions(func);
    }
}
