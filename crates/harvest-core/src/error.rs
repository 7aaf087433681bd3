use thiserror::Error;

/// Application-wide error types for docharvest.
///
/// Note: a duplicate URL is deliberately *not* an error. The frontier
/// dedups on url, and rediscovering a stored URL surfaces as
/// [`InsertOutcome::Duplicate`](crate::store::InsertOutcome), which the
/// caller records as `skipped`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Config or frontier entry violates an invariant. Fatal at load time.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Missing or malformed environment configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Non-2xx response from the target site.
    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Semantic extractor call failed.
    #[error("Extractor error (HTTP {status_code}): {message}")]
    ExtractorError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// A target or seed regex failed to compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    PatternError { pattern: String, message: String },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    ///
    /// Per the retry policy: timeouts, connection failures, and 5xx
    /// responses are transient; 4xx responses, validation failures, and
    /// pattern errors are permanent and fail immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            AppError::ExtractorError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}
