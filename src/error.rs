//! Error taxonomy shared by the adapters and the tool surface.
//!
//! Adapters translate raw transport failures into these variants before the
//! core ever sees them. Every failure either retries within the adapter's
//! bound or surfaces here with a stable `kind()` and a readable message.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PickyError>;

#[derive(Debug, Error)]
pub enum PickyError {
    /// Missing or invalid credentials. Fatal at startup, never per-request.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed tool parameters. The request is aborted with no partial
    /// effect.
    #[error("invalid parameter: {0}")]
    Validation(String),

    /// A named restaurant or session does not exist (or has expired).
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream timeout or 5xx that survived the adapter's retry budget.
    #[error("transient upstream failure from {service}: {message}")]
    UpstreamTransient { service: String, message: String },

    /// Upstream rejected our credentials. Not retryable.
    #[error("{service} rejected credentials: {message}")]
    Auth { service: String, message: String },

    /// Upstream quota exhausted. Not retryable.
    #[error("quota exceeded for {0}")]
    QuotaExceeded(String),
}

impl PickyError {
    /// Stable machine-readable kind, surfaced in JSON-RPC error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PickyError::Configuration(_) => "configuration",
            PickyError::Validation(_) => "validation",
            PickyError::NotFound(_) => "not_found",
            PickyError::UpstreamTransient { .. } => "upstream_transient",
            PickyError::Auth { .. } => "upstream_auth",
            PickyError::QuotaExceeded(_) => "upstream_quota",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, PickyError::UpstreamTransient { .. })
    }

    pub fn transient(service: impl Into<String>, message: impl ToString) -> Self {
        PickyError::UpstreamTransient {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn auth(service: impl Into<String>, message: impl ToString) -> Self {
        PickyError::Auth {
            service: service.into(),
            message: message.to_string(),
        }
    }
}
