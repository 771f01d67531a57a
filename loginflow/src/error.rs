use crate::har;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed trace: {0}")]
    MalformedTrace(#[from] har::error::Error),

    #[error("Syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("Nothing to normalize: no exchanges and no configuration documents")]
    InsufficientInput,

    #[error("IoError: {0}")]
    IoError(#[from] io::Error),
}

impl Error {
    pub(crate) fn syntax<S: Into<String>>(line: usize, reason: S) -> Self {
        Error::Syntax {
            line,
            reason: reason.into(),
        }
    }
}
