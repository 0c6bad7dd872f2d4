use thiserror::Error;

/// Application-wide error types for haul.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request could not be built or sent.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Upstream answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Upstream payload did not have the expected shape.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// The circuit breaker rejected the call without attempting it.
    #[error("Circuit breaker '{name}' is open. Retry after {retry_after_secs} seconds.")]
    CircuitOpen { name: String, retry_after_secs: u64 },

    /// Admission was refused by the rate limiter.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// The caller built a request the system cannot serve.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Stable snake_case label, used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::HttpError(_)
            | AppError::HttpStatus { .. }
            | AppError::NetworkError(_)
            | AppError::Timeout(_) => "transport_error",
            AppError::ExtractionError(_) | AppError::SerializationError(_) => "extraction_error",
            AppError::CircuitOpen { .. } => "circuit_open",
            AppError::RateLimitExceeded => "rate_limit_exceeded",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::ConfigError(_) => "config_error",
            AppError::Generic(_) => "internal_error",
        }
    }

    /// Returns true for network, timeout and status failures.
    pub fn is_transport(&self) -> bool {
        self.kind() == "transport_error"
    }

    /// Returns true if upstream told us to slow down (HTTP 429).
    pub fn is_upstream_rate_limit(&self) -> bool {
        matches!(self, AppError::HttpStatus { status: 429, .. })
    }

    /// Caller-programming errors are never degraded into fallback data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::InvalidRequest(_) | AppError::ConfigError(_))
    }
}
