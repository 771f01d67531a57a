mod config;
mod data;
mod diagnostic;
mod error;
mod flow;
mod generator;
mod har;
mod ingest_configuration;
mod normalizer;
mod redaction;
mod session;
mod session_configuration;
mod synthesizer;
mod util;
mod validator;

pub use config::document::{ConfigDocument, Dialect, Entry, Section, SectionKind};
pub use config::{parse, ParsedConfig};
pub use data::{Exchange, Headers, RequestBody, RequestData, ResponseData};
pub use diagnostic::{count, has_errors, max_severity, Diagnostic, Location, Severity};
pub use error::Error;
pub use flow::{
    Binding, ExtractionRule, FieldBinding, FlowStep, FollowUp, LoginFlow, StepOrigin,
    TokenRequirement, PASS_MARKER, USER_MARKER,
};
pub use generator::{FlowGenerator, JsonPayloadGenerator};
pub use har::error::Error as TraceError;
pub use har::{ingest, ingest_with};
pub use ingest_configuration::{
    IngestConfiguration, DEFAULT_LOGIN_KEYWORDS, DEFAULT_MAX_BODY_SNIPPET,
};
pub use loginflow_codegen::loginflow_fixture_test;
pub use normalizer::{check_token_order, finalize, normalize, NormalizedFlow};
pub use redaction::{Redaction, RedactionBuilder};
pub use session::{FlowSession, InputFile, SessionReport};
pub use session_configuration::SessionConfiguration;
pub use synthesizer::{synthesize, SynthesizedConfig};
pub use validator::{is_structurally_valid, validate, validate_text, STRUCTURALLY_VALID};
