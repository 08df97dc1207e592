//! Error types for Transcast

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TranscastError>;

#[derive(Error, Debug)]
pub enum TranscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TranscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TranscastError::Config(_) => 2,
            TranscastError::Cursor(_) => 1,
            TranscastError::Platform(_) => 1,
            TranscastError::Translation(_) => 1,
            TranscastError::InvalidInput(_) => 1,
        }
    }

    /// Rate-limit reset hint carried by a platform error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TranscastError::Platform(e) => e.retry_after(),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Authenticated account @{actual} does not match TARGET_USER @{expected}")]
    IdentityMismatch { expected: String, actual: String },
}

/// Failures persisting the forwarding cursor. These are never swallowed:
/// continuing after a lost cursor write risks forwarding a post twice.
#[derive(Error, Debug)]
pub enum CursorError {
    #[error("Failed to write cursor file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to move cursor backwards from {current} to {proposed}")]
    Regression { current: String, proposed: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Network and rate-limit failures clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::Network(_) | PlatformError::RateLimit { .. })
    }

    /// Server-provided hint for when the next request may succeed
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PlatformError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    #[error("Translation service unreachable: {0}")]
    Network(String),

    #[error("Translation service rejected the request ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Malformed translation response: {0}")]
    Decode(String),

    #[error("Translation service returned an empty result")]
    Empty,
}

impl TranslationError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TranslationError::Network(_) => true,
            TranslationError::Service { status, .. } => *status == 429 || *status >= 500,
            TranslationError::Decode(_) | TranslationError::Empty => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let error = TranscastError::Config(ConfigError::MissingField("BEARER_TOKEN".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_cursor_error() {
        let error = TranscastError::Cursor(CursorError::Write {
            path: "lastTweetId.txt".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        });
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_platform_error() {
        let error = TranscastError::Platform(PlatformError::Network("timeout".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting_config() {
        let error = TranscastError::Config(ConfigError::MissingField("SOURCE_USER".to_string()));
        assert_eq!(
            format!("{}", error),
            "Configuration error: Missing required field: SOURCE_USER"
        );
    }

    #[test]
    fn test_error_message_formatting_invalid_value() {
        let error = ConfigError::InvalidValue {
            field: "BATCH_SIZE".to_string(),
            reason: "must be between 5 and 100".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Invalid value for BATCH_SIZE: must be between 5 and 100"
        );
    }

    #[test]
    fn test_identity_mismatch_names_both_accounts() {
        let error = ConfigError::IdentityMismatch {
            expected: "hindi_mirror".to_string(),
            actual: "someone_else".to_string(),
        };
        let message = format!("{}", error);
        assert!(message.contains("@hindi_mirror"));
        assert!(message.contains("@someone_else"));
    }

    #[test]
    fn test_error_message_formatting_rate_limit() {
        let error = TranscastError::Platform(PlatformError::RateLimit {
            message: "Too many requests".to_string(),
            retry_after: Some(Duration::from_secs(60)),
        });
        assert_eq!(
            format!("{}", error),
            "Platform error: Rate limit exceeded: Too many requests"
        );
    }

    #[test]
    fn test_platform_error_transience() {
        assert!(PlatformError::Network("reset".to_string()).is_transient());
        assert!(PlatformError::RateLimit {
            message: "slow down".to_string(),
            retry_after: None,
        }
        .is_transient());
        assert!(!PlatformError::Authentication("bad token".to_string()).is_transient());
        assert!(!PlatformError::Validation("too long".to_string()).is_transient());
        assert!(!PlatformError::Posting("duplicate".to_string()).is_transient());
        assert!(!PlatformError::Decode("not json".to_string()).is_transient());
    }

    #[test]
    fn test_retry_after_only_for_rate_limits() {
        let limited = PlatformError::RateLimit {
            message: "429".to_string(),
            retry_after: Some(Duration::from_secs(900)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(900)));
        assert_eq!(PlatformError::Network("x".to_string()).retry_after(), None);
    }

    #[test]
    fn test_translation_error_transience() {
        assert!(TranslationError::Network("dns".to_string()).is_transient());
        assert!(TranslationError::Service {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(TranslationError::Service {
            status: 429,
            message: "quota".to_string()
        }
        .is_transient());
        assert!(!TranslationError::Service {
            status: 400,
            message: "bad language".to_string()
        }
        .is_transient());
        assert!(!TranslationError::Empty.is_transient());
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Posting("test".to_string());
        let error: TranscastError = platform_error.into();

        match error {
            TranscastError::Platform(_) => {}
            _ => panic!("Expected TranscastError::Platform"),
        }
    }

    #[test]
    fn test_error_conversion_from_cursor_error() {
        let cursor_error = CursorError::Regression {
            current: "101".to_string(),
            proposed: "100".to_string(),
        };
        let error: TranscastError = cursor_error.into();

        match error {
            TranscastError::Cursor(_) => {}
            _ => panic!("Expected TranscastError::Cursor"),
        }
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();

        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
