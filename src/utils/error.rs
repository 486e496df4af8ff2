use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatusError { url: String, status: u16 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing field '{field}' in {context}")]
    MissingFieldError { field: String, context: String },

    #[error("Connectivity check against {url} failed: {message}")]
    ConnectivityCheckError { url: String, message: String },

    #[error("Gave up after {attempts} attempts: {message}")]
    RetriesExhaustedError { attempts: u32, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connectivity,
    Parse,
    MissingField,
    Configuration,
    Io,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        EtlError::MissingFieldError {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(e) if e.is_decode() => ErrorCategory::Parse,
            EtlError::ApiError(_)
            | EtlError::HttpStatusError { .. }
            | EtlError::ConnectivityCheckError { .. }
            | EtlError::RetriesExhaustedError { .. } => ErrorCategory::Connectivity,
            EtlError::CsvError(_) | EtlError::SerializationError(_) => ErrorCategory::Parse,
            EtlError::MissingFieldError { .. } => ErrorCategory::MissingField,
            EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) => ErrorCategory::Io,
            EtlError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    /// Transport failures, 5xx/429 responses and undecodable JSON bodies are
    /// worth another attempt. Everything else fails the same way twice.
    pub fn is_retryable(&self) -> bool {
        match self {
            EtlError::ApiError(e) => !e.is_builder() && !e.is_redirect(),
            EtlError::HttpStatusError { status, .. } => *status >= 500 || *status == 429,
            EtlError::SerializationError(_) => true,
            _ => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::MissingField => ErrorSeverity::Low,
            ErrorCategory::Parse => ErrorSeverity::Medium,
            ErrorCategory::Connectivity => match self {
                EtlError::ConnectivityCheckError { .. } => ErrorSeverity::Critical,
                _ => ErrorSeverity::Medium,
            },
            ErrorCategory::Configuration | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Connectivity => {
                "Check network access to the API and retry later, or raise --max-retries"
            }
            ErrorCategory::Parse => "The upstream response changed shape; re-run with --verbose to inspect it",
            ErrorCategory::MissingField => "The upstream record is incomplete; it is reported as unavailable",
            ErrorCategory::Configuration => "Fix the flag or config file value named above",
            ErrorCategory::Io => "Check that the output directory exists and is writable",
            ErrorCategory::Processing => "Re-run with --verbose and inspect the log",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ConnectivityCheckError { url, .. } => {
                format!("Could not reach the dataset API at {}", url)
            }
            EtlError::RetriesExhaustedError { attempts, .. } => {
                format!("The dataset API kept failing after {} attempts", attempts)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
