use crate::domain::model::StageKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VendorAiError {
    #[error("Input error: {message}")]
    InputError { message: String },

    #[error("Stage {stage} failed for vendor '{vendor}': {message}")]
    StageError {
        vendor: String,
        stage: StageKind,
        message: String,
    },

    #[error("Search augmentation failed: {message}")]
    AugmentationError { message: String },

    #[error("LLM request failed: {message}")]
    LlmError { message: String },

    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

pub type Result<T> = std::result::Result<T, VendorAiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Stage,
    Augmentation,
    Configuration,
    Network,
    System,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl VendorAiError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::InputError {
            message: message.into(),
        }
    }

    pub fn stage(vendor: impl Into<String>, stage: StageKind, message: impl Into<String>) -> Self {
        Self::StageError {
            vendor: vendor.into(),
            stage,
            message: message.into(),
        }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::LlmError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputError { .. } | Self::CsvError(_) => ErrorCategory::Input,
            Self::StageError { .. } => ErrorCategory::Stage,
            Self::AugmentationError { .. } => ErrorCategory::Augmentation,
            Self::LlmError { .. } | Self::HttpError(_) => ErrorCategory::Network,
            Self::IoError(_) => ErrorCategory::System,
            Self::SerializationError(_) => ErrorCategory::Data,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 搜尋失敗一律降級處理，不影響結果
            ErrorCategory::Augmentation => ErrorSeverity::Low,
            ErrorCategory::Stage | ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Configuration | ErrorCategory::Data => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InputError { .. } | Self::CsvError(_) => {
                "Check that the CSV file exists and has a 'Vendor,Amount' header"
            }
            Self::StageError { .. } | Self::LlmError { .. } => {
                "Retry later or raise --max-retries; check the LLM API key and model name"
            }
            Self::AugmentationError { .. } => "Check SERPER_API_KEY; the run continues without search results",
            Self::HttpError(_) => "Check network connectivity and the configured base URLs",
            Self::IoError(_) => "Check file permissions and free disk space for the output path",
            Self::SerializationError(_) => "The remote API returned an unexpected payload",
            Self::MissingConfigError { .. } => {
                "Set OPENAI_API_KEY in the environment or in a .env file"
            }
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the value in the TOML config file or on the command line"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InputError { message } => format!("Could not read vendor input: {}", message),
            Self::StageError { vendor, stage, .. } => {
                format!("Analysis of '{}' stopped at the {} stage", vendor, stage)
            }
            Self::MissingConfigError { field } => format!("Missing required setting: {}", field),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    /// 依嚴重程度決定 CLI 退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_is_high_severity() {
        let err = VendorAiError::input("vendors.csv not found");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_stage_error_carries_vendor_and_stage() {
        let err = VendorAiError::stage("Acme", StageKind::Discover, "empty response");
        assert_eq!(
            err.to_string(),
            "Stage Discover failed for vendor 'Acme': empty response"
        );
        assert_eq!(err.category(), ErrorCategory::Stage);
        assert!(err.user_friendly_message().contains("Acme"));
    }

    #[test]
    fn test_augmentation_error_never_fails_the_run() {
        let err = VendorAiError::AugmentationError {
            message: "timeout".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn test_io_error_is_critical() {
        let err = VendorAiError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
    }
}
