use crate::config::{
    validate_settings, DEFAULT_CONCURRENT_REQUESTS, DEFAULT_MAX_DATASETS, DEFAULT_MAX_RETRIES,
    DEFAULT_OUTPUT_FILE, DEFAULT_QMI_LIMIT, DEFAULT_QMI_MAX_RETRIES,
    DEFAULT_QMI_MIN_PARAGRAPH_CHARS, DEFAULT_QMI_SKIP_LEADING, DEFAULT_QMI_SKIP_TRAILING,
    DEFAULT_RATE_LIMIT_PER_SECOND, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_SUMMARY_SAMPLE_ROWS,
};
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub qmi: QmiConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub listing_endpoint: String,
    /// Absent means the secondary source is skipped.
    pub secondary_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarvestConfig {
    pub max_datasets: Option<usize>,
    pub qmi_limit: Option<usize>,
    pub concurrent_requests: Option<usize>,
    pub rate_limit_per_second: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub summary_sample_rows: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub qmi_max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QmiConfig {
    pub skip_leading: Option<usize>,
    pub skip_trailing: Option<usize>,
    pub min_paragraph_chars: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_file: Option<String>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left
    /// as written so validation reports them.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}

impl ConfigProvider for TomlConfig {
    fn listing_endpoint(&self) -> &str {
        &self.source.listing_endpoint
    }

    fn secondary_endpoint(&self) -> Option<&str> {
        self.source.secondary_endpoint.as_deref()
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_file(&self) -> &str {
        self.load.output_file.as_deref().unwrap_or(DEFAULT_OUTPUT_FILE)
    }

    fn max_datasets(&self) -> usize {
        self.harvest.max_datasets.unwrap_or(DEFAULT_MAX_DATASETS)
    }

    fn qmi_limit(&self) -> usize {
        self.harvest.qmi_limit.unwrap_or(DEFAULT_QMI_LIMIT)
    }

    fn concurrent_requests(&self) -> usize {
        self.harvest
            .concurrent_requests
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }

    fn rate_limit_per_second(&self) -> u32 {
        self.harvest
            .rate_limit_per_second
            .unwrap_or(DEFAULT_RATE_LIMIT_PER_SECOND)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.harvest
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    fn max_retries(&self) -> u32 {
        self.retry.max_attempts.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    fn qmi_max_retries(&self) -> u32 {
        self.retry.qmi_max_attempts.unwrap_or(DEFAULT_QMI_MAX_RETRIES)
    }

    fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS))
    }

    fn qmi_skip_leading(&self) -> usize {
        self.qmi.skip_leading.unwrap_or(DEFAULT_QMI_SKIP_LEADING)
    }

    fn qmi_skip_trailing(&self) -> usize {
        self.qmi.skip_trailing.unwrap_or(DEFAULT_QMI_SKIP_TRAILING)
    }

    fn qmi_min_paragraph_chars(&self) -> usize {
        self.qmi
            .min_paragraph_chars
            .unwrap_or(DEFAULT_QMI_MIN_PARAGRAPH_CHARS)
    }

    fn summary_sample_rows(&self) -> usize {
        self.harvest
            .summary_sample_rows
            .unwrap_or(DEFAULT_SUMMARY_SAMPLE_ROWS)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_settings(self)
    }
}
