use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Dataset is missing required field: {field}")]
    MissingField { field: String },

    #[error("Flow search failed: {message}")]
    Search { message: String },

    #[error("Flow search timed out after {millis}ms")]
    SearchTimeout { millis: u64 },

    #[error("Oracle response format error: {message}")]
    ResponseFormat { message: String },

    #[error("Oracle call failed: {message}")]
    Oracle { message: String },

    #[error("Alignment service has been closed")]
    ServiceClosed,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Dataset,
    Network,
    Oracle,
    Io,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlignError {
    /// 只有遠端搜尋失敗與逾時可以重試一次
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Search { .. } | Self::SearchTimeout { .. })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => ErrorCategory::Configuration,
            Self::MissingField { .. } | Self::ProcessingError { .. } => ErrorCategory::Dataset,
            Self::HttpError(_) | Self::Search { .. } | Self::SearchTimeout { .. } => {
                ErrorCategory::Network
            }
            Self::ResponseFormat { .. } | Self::Oracle { .. } => ErrorCategory::Oracle,
            Self::IoError(_) | Self::ZipError(_) | Self::CsvError(_) => ErrorCategory::Io,
            Self::SerializationError(_) | Self::ServiceClosed => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ResponseFormat { .. } | Self::Oracle { .. } => ErrorSeverity::Low,
            Self::HttpError(_) | Self::Search { .. } | Self::SearchTimeout { .. } => {
                ErrorSeverity::Medium
            }
            Self::MissingField { .. }
            | Self::ProcessingError { .. }
            | Self::SerializationError(_)
            | Self::CsvError(_) => ErrorSeverity::High,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::IoError(_)
            | Self::ZipError(_)
            | Self::ServiceClosed => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the configuration file and command-line flags".to_string()
            }
            ErrorCategory::Dataset => {
                "Make sure the input is a process dataset with an 'exchanges' section".to_string()
            }
            ErrorCategory::Network => {
                "Check that the flow search service is reachable and retry later".to_string()
            }
            ErrorCategory::Oracle => {
                "Check the language model endpoint; similarity selection is used meanwhile"
                    .to_string()
            }
            ErrorCategory::Io => "Check file paths and write permissions".to_string(),
            ErrorCategory::Internal => "Re-run with --verbose and report the log".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingField { field } => {
                format!("The process dataset has no '{}' section", field)
            }
            Self::Search { .. } | Self::SearchTimeout { .. } | Self::HttpError(_) => {
                format!("Could not reach the flow catalogue: {}", self)
            }
            Self::ServiceClosed => "The alignment service was already shut down".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;
