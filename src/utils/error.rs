use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("HTTP {status} returned by {url}: {body}")]
    HttpStatusError {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Request timed out after {duration_ms} ms")]
    TimeoutError { duration_ms: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' is invalid: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("{message}")]
    ValidationError { message: String },

    #[error("{message}")]
    AuthenticationError { message: String },

    #[error("{message}")]
    UnsupportedOperation { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ShError {
    pub fn validation(message: impl Into<String>) -> Self {
        ShError::ValidationError {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        ShError::UnsupportedOperation {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        ShError::ProcessingError {
            message: message.into(),
        }
    }

    /// Only transient failures (timeouts, connection errors, 5xx and 429) are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ShError::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ShError::HttpStatusError { status, .. } => *status >= 500 || *status == 429,
            ShError::TimeoutError { .. } => true,
            _ => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ShError::ApiError(_) | ShError::HttpStatusError { .. } | ShError::TimeoutError { .. } => {
                ErrorSeverity::Medium
            }
            ShError::ValidationError { .. }
            | ShError::UnsupportedOperation { .. }
            | ShError::AuthenticationError { .. }
            | ShError::ConfigError { .. }
            | ShError::ConfigValidationError { .. }
            | ShError::InvalidConfigValueError { .. }
            | ShError::MissingConfigError { .. } => ErrorSeverity::High,
            ShError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ShError::ApiError(_) | ShError::TimeoutError { .. } => {
                "Check network connectivity or raise [http].timeout_seconds"
            }
            ShError::HttpStatusError { status, .. } if *status == 401 || *status == 403 => {
                "Check the OAuth client credentials or the auth token"
            }
            ShError::HttpStatusError { .. } => "The service rejected the request; inspect the response body",
            ShError::AuthenticationError { .. } => {
                "Set [auth].client_id/client_secret or pass --token"
            }
            ShError::ConfigError { .. }
            | ShError::ConfigValidationError { .. }
            | ShError::InvalidConfigValueError { .. }
            | ShError::MissingConfigError { .. } => "Fix the configuration file and try again",
            ShError::ValidationError { .. } | ShError::UnsupportedOperation { .. } => {
                "Check the command arguments"
            }
            _ => "Re-run with --verbose for more details",
        }
    }
}

pub type Result<T> = std::result::Result<T, ShError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let server_error = ShError::HttpStatusError {
            status: 503,
            url: "http://x".to_string(),
            body: String::new(),
        };
        let throttled = ShError::HttpStatusError {
            status: 429,
            url: "http://x".to_string(),
            body: String::new(),
        };
        let bad_request = ShError::HttpStatusError {
            status: 400,
            url: "http://x".to_string(),
            body: String::new(),
        };

        assert!(server_error.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!ShError::validation("Parameter fromTime must be specified").is_retryable());
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = ShError::validation("Parameter toTime must be specified");
        assert_eq!(err.to_string(), "Parameter toTime must be specified");
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
