//! Error types for the chore board client.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Push error: {0}")]
    Push(#[from] PushError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from calls against the backend REST surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, reset, timeout).
    #[error("Transport error on {operation}: {reason}")]
    Transport { operation: String, reason: String },

    /// The backend answered with a non-2xx status.
    #[error("{operation} failed with status {status}: {message}")]
    Status {
        operation: String,
        status: u16,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("Invalid response body for {operation}: {reason}")]
    Decode { operation: String, reason: String },

    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ApiError {
    /// HTTP status code, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Push channel errors.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("Push channel disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("Invalid push URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Authentication rejected for {name}")]
    Rejected { name: String },

    #[error("{action} requires an admin session")]
    AdminRequired { action: String },
}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
