//! Error taxonomy shared by every OPAX crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpaxError>;

#[derive(Error, Debug)]
pub enum OpaxError {
    /// Tax rules or instrument catalog are missing, malformed or inconsistent.
    /// Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding backend could not be initialized or failed mid-request.
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),

    /// Caller-supplied data is unusable (bad profile fields, empty statement).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl OpaxError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn classification(msg: impl Into<String>) -> Self {
        Self::ClassificationUnavailable(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
