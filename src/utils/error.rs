use std::sync::Arc;
use thiserror::Error;

/// 錯誤分類，用於日誌與 CLI 退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    NotFound,
    Cache,
    Io,
    Data,
    Config,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// io / serde 錯誤放在 `Arc` 內，讓合併中的請求可以把同一個錯誤交給每個等待者
#[derive(Error, Debug, Clone)]
pub enum EtlError {
    #[error("Source unavailable: {endpoint} failed after {attempts} attempt(s): {message}")]
    SourceUnavailable {
        endpoint: String,
        attempts: u32,
        message: String,
    },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Corrupt cache entry '{key}': {message}")]
    CorruptCache { key: String, message: String },

    #[error("Malformed payload from {endpoint}: {message}")]
    MalformedPayload { endpoint: String, message: String },

    #[error("IO error: {0}")]
    IoError(Arc<std::io::Error>),

    #[error("Serialization error: {0}")]
    SerializationError(Arc<serde_json::Error>),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Background task failed: {message}")]
    TaskFailed { message: String },
}

impl From<std::io::Error> for EtlError {
    fn from(e: std::io::Error) -> Self {
        EtlError::IoError(Arc::new(e))
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(e: serde_json::Error) -> Self {
        EtlError::SerializationError(Arc::new(e))
    }
}

impl EtlError {
    pub fn not_found(message: impl Into<String>) -> Self {
        EtlError::NotFound {
            message: message.into(),
        }
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, EtlError::SourceUnavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EtlError::NotFound { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::SourceUnavailable { .. } => ErrorCategory::Network,
            EtlError::NotFound { .. } => ErrorCategory::NotFound,
            EtlError::CorruptCache { .. } => ErrorCategory::Cache,
            EtlError::IoError(_) => ErrorCategory::Io,
            EtlError::MalformedPayload { .. } | EtlError::SerializationError(_) => {
                ErrorCategory::Data
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorCategory::Config,
            EtlError::TaskFailed { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::NotFound | ErrorCategory::Cache => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Io | ErrorCategory::Data | ErrorCategory::Config => ErrorSeverity::High,
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "The deck source is down or unreachable. Try again later; cached data is used when available."
            }
            ErrorCategory::NotFound => {
                "Check the deck identifier or URL. Supported sites are listed by the `import` command."
            }
            ErrorCategory::Cache => "Run `clear-cache` and retry.",
            ErrorCategory::Io => "Check that the output directory exists, is writable and has free space.",
            ErrorCategory::Data => {
                "The upstream site returned data in an unexpected shape. Retry later or report the deck."
            }
            ErrorCategory::Config => "Fix the configuration file or command line flags.",
            ErrorCategory::Internal => "This is a bug. Re-run with --verbose and report the log.",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::SourceUnavailable { endpoint, .. } => {
                format!("Could not reach {} (no deck was written)", endpoint)
            }
            EtlError::NotFound { message } => message.clone(),
            EtlError::IoError(e) => format!("File operation failed: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
