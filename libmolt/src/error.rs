//! Error types for molt

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MoltError>;

/// Grammar accepted by the time expression parser, echoed back on failure.
pub const TIME_EXPRESSION_GRAMMAR: &str =
    "expected '+<n>m', '+<n>h', '+<n>d' or 'YYYY-MM-DD HH:MM' (local time)";

#[derive(Error, Debug)]
pub enum MoltError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Unknown identifier '{0}' (run a listing command such as 'molt feed' to refresh short ids)")]
    UnknownIdentifier(String),

    #[error("Invalid time expression '{input}': {reason} ({})", TIME_EXPRESSION_GRAMMAR)]
    InvalidTimeExpression { input: String, reason: String },

    #[error("Corrupt store {}: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MoltError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        MoltError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_time(input: &str, reason: impl Into<String>) -> Self {
        MoltError::InvalidTimeExpression {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            MoltError::InvalidInput(_) => 3,
            MoltError::InvalidTimeExpression { .. } => 3,
            MoltError::UnknownIdentifier(_) => 3,
            MoltError::NotFound { .. } => 4,
            MoltError::Remote(e) if e.is_auth() => 2,
            MoltError::Remote(_) => 1,
            MoltError::Config(_) => 1,
            MoltError::Store(_) => 1,
            MoltError::CorruptStore { .. } => 1,
        }
    }

    /// Short stable name of the error kind, printed alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            MoltError::NotFound { .. } => "not_found",
            MoltError::UnknownIdentifier(_) => "unknown_identifier",
            MoltError::InvalidTimeExpression { .. } => "invalid_time_expression",
            MoltError::CorruptStore { .. } => "corrupt_store",
            MoltError::Remote(_) => "remote_error",
            MoltError::Config(_) => "config_error",
            MoltError::Store(_) => "store_error",
            MoltError::InvalidInput(_) => "invalid_input",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    WriteError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Failure reported by the remote service or the transport in front of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// HTTP status when the server answered, `None` for transport failures
    pub status: Option<u16>,
    pub reason: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "HTTP {}: {}", code, self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for RemoteError {}

impl RemoteError {
    pub fn new(status: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self.status, Some(401) | Some(403))
    }
}
