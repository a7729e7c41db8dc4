use thiserror::Error;

/// Errors raised by capability clients.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("Request failed: {0}")]
    Http(String),

    /// The provider answered with a non-success status.
    #[error("Provider returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The provider answered, but not in the documented shape.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The client could not be built from configuration.
    #[error("Capability misconfigured: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        CapabilityError::Http(err.to_string())
    }
}

impl From<crate::secrets::SecretError> for CapabilityError {
    fn from(err: crate::secrets::SecretError) -> Self {
        CapabilityError::Configuration(err.to_string())
    }
}
