use thiserror::Error;

/// Status codes the retry filter treats as transient.
const TRANSIENT_STATUS: &[u16] = &[408, 429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(
        "Sorry, tableshim doesn't natively support the '{option}' operation (requested by {operation}). \
         For the time being if you'd like to use this operation you'll have to implement it in your application logic."
    )]
    Unsupported { operation: String, option: String },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema not found for {0}")]
    SchemaNotFound(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection pool has not been initialized; register a collection first")]
    NotInitialized,

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Stream sink error: {0}")]
    Sink(String),
}

impl AdapterError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend { status, message: message.into() }
    }

    pub fn unsupported(operation: &str, option: &str) -> Self {
        Self::Unsupported { operation: operation.to_string(), option: option.to_string() }
    }

    /// True for backend failures worth retrying (throttling, timeouts, server errors).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { status, .. } if TRANSIENT_STATUS.contains(status))
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
