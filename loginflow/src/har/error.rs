use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The trace is not a valid HAR document: {0}")]
    InvalidFormat(#[from] serde_json::Error),

    #[error("The HAR log has no version")]
    MissingVersion,

    #[error("Unsupported HAR version {0}")]
    UnsupportedVersion(String),

    #[error("The HAR log has no entries list")]
    MissingEntries,

    #[error("Entry {entry} has no {field}")]
    MissingField { entry: usize, field: &'static str },

    #[error("Entry {entry} has an invalid status code {status}")]
    InvalidStatusCode { entry: usize, status: i64 },
}
