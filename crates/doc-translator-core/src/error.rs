use thiserror::Error;

/// Unified error type for doc-translator-core
///
/// Variants are grouped by the stage that failed so callers can tell an
/// unreadable upload from a provider outage or a bad PDF synthesis:
/// - Upload (parsing, unsupported MIME types)
/// - Gateway (LLM request, authentication, rate limiting, responses)
/// - Encoding (re-encoding translated text for download)
/// - Workflow (actions out of sequence, busy sessions)
/// - Configuration and I/O
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Upload Errors
    // ==========================================================================
    /// The uploaded bytes could not be parsed as the declared format
    #[error("failed to parse document: {0}")]
    DocumentParse(String),

    /// The declared MIME type is not one we can extract
    #[error("unsupported document type '{0}' (expected application/pdf, text/plain or text/markdown)")]
    UnsupportedFormat(String),

    // ==========================================================================
    // Gateway Errors
    // ==========================================================================
    /// Request to the LLM endpoint failed (network or non-success status)
    #[error("LLM request failed: {0}")]
    GatewayRequest(String),

    /// The LLM endpoint rejected our credentials
    #[error("LLM authentication failed: {0}")]
    GatewayAuth(String),

    /// Rate limited by the LLM endpoint
    #[error("LLM rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    GatewayRateLimited { retry_after: Option<u64> },

    /// LLM request timed out
    #[error("LLM request timed out")]
    GatewayTimeout,

    /// The LLM answered with something we cannot use
    #[error("invalid LLM response: {0}")]
    GatewayInvalidResponse(String),

    // ==========================================================================
    // Encoding Errors
    // ==========================================================================
    /// Failed to re-encode translated text into the download format
    #[error("failed to encode output: {0}")]
    Encode(String),

    // ==========================================================================
    // Workflow Errors
    // ==========================================================================
    /// Action attempted out of sequence
    #[error("cannot {action} while the workflow is {stage}")]
    InvalidState { action: &'static str, stage: String },

    /// Another action is already running on this session
    #[error("session is busy with another action")]
    SessionBusy,

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`] by failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DocumentParse,
    UnsupportedFormat,
    Gateway,
    Encode,
    InvalidState,
    SessionBusy,
    Config,
    Io,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DocumentParse(_) => ErrorKind::DocumentParse,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::GatewayRequest(_)
            | Self::GatewayAuth(_)
            | Self::GatewayRateLimited { .. }
            | Self::GatewayTimeout
            | Self::GatewayInvalidResponse(_) => ErrorKind::Gateway,
            Self::Encode(_) => ErrorKind::Encode,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::SessionBusy => ErrorKind::SessionBusy,
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// True for every failure of the LLM call.
    pub const fn is_gateway(&self) -> bool {
        matches!(self.kind(), ErrorKind::Gateway)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
