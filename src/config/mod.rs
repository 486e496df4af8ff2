pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_file_name, validate_path, validate_positive_number, validate_range, validate_url,
    Validate,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LISTING_ENDPOINT: &str = "https://api.beta.ons.gov.uk/v1/datasets";
pub const DEFAULT_SECONDARY_ENDPOINT: &str =
    "https://www.nomisweb.co.uk/api/v01/dataset/def.sdmx.json";
pub const DEFAULT_OUTPUT_FILE: &str = "ons_datasets_metadata.csv";
pub const DEFAULT_MAX_DATASETS: usize = 500;
pub const DEFAULT_QMI_LIMIT: usize = 1000;
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 8;
pub const MAX_CONCURRENT_REQUESTS: usize = 64;
pub const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_QMI_MAX_RETRIES: u32 = 100;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_QMI_SKIP_LEADING: usize = 4;
pub const DEFAULT_QMI_SKIP_TRAILING: usize = 7;
pub const DEFAULT_QMI_MIN_PARAGRAPH_CHARS: usize = 35;
pub const DEFAULT_SUMMARY_SAMPLE_ROWS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "ons-compendium")]
#[command(about = "Harvest ONS and Nomis dataset metadata into a compendium CSV")]
pub struct CliConfig {
    #[arg(long, default_value = DEFAULT_LISTING_ENDPOINT)]
    pub listing_endpoint: String,

    #[arg(long, default_value = DEFAULT_SECONDARY_ENDPOINT)]
    pub secondary_endpoint: String,

    #[arg(long, help = "Do not query the secondary (Nomis) source")]
    pub skip_secondary: bool,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: String,

    #[arg(long, default_value_t = DEFAULT_MAX_DATASETS)]
    pub max_datasets: usize,

    #[arg(long, default_value_t = DEFAULT_QMI_LIMIT)]
    pub qmi_limit: usize,

    #[arg(long, default_value_t = DEFAULT_CONCURRENT_REQUESTS)]
    pub concurrent_requests: usize,

    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT_PER_SECOND)]
    pub rate_limit_per_second: u32,

    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    #[arg(long, default_value_t = DEFAULT_QMI_MAX_RETRIES)]
    pub qmi_max_retries: u32,

    #[arg(long, default_value_t = DEFAULT_RETRY_BASE_DELAY_MS)]
    pub retry_base_delay_ms: u64,

    #[arg(long, default_value_t = DEFAULT_QMI_SKIP_LEADING)]
    pub qmi_skip_leading: usize,

    #[arg(long, default_value_t = DEFAULT_QMI_SKIP_TRAILING)]
    pub qmi_skip_trailing: usize,

    #[arg(long, default_value_t = DEFAULT_QMI_MIN_PARAGRAPH_CHARS)]
    pub qmi_min_paragraph_chars: usize,

    #[arg(long, default_value_t = DEFAULT_SUMMARY_SAMPLE_ROWS)]
    pub summary_sample_rows: usize,

    #[arg(long, help = "Load settings from a TOML file instead of flags")]
    pub config: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl ConfigProvider for CliConfig {
    fn listing_endpoint(&self) -> &str {
        &self.listing_endpoint
    }

    fn secondary_endpoint(&self) -> Option<&str> {
        if self.skip_secondary {
            None
        } else {
            Some(&self.secondary_endpoint)
        }
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_file(&self) -> &str {
        &self.output_file
    }

    fn max_datasets(&self) -> usize {
        self.max_datasets
    }

    fn qmi_limit(&self) -> usize {
        self.qmi_limit
    }

    fn concurrent_requests(&self) -> usize {
        self.concurrent_requests
    }

    fn rate_limit_per_second(&self) -> u32 {
        self.rate_limit_per_second
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn qmi_max_retries(&self) -> u32 {
        self.qmi_max_retries
    }

    fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    fn qmi_skip_leading(&self) -> usize {
        self.qmi_skip_leading
    }

    fn qmi_skip_trailing(&self) -> usize {
        self.qmi_skip_trailing
    }

    fn qmi_min_paragraph_chars(&self) -> usize {
        self.qmi_min_paragraph_chars
    }

    fn summary_sample_rows(&self) -> usize {
        self.summary_sample_rows
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_settings(self)
    }
}

/// Checks shared by every configuration source; field names follow the CLI
/// flags.
pub(crate) fn validate_settings<C: ConfigProvider>(config: &C) -> Result<()> {
    validate_url("listing_endpoint", config.listing_endpoint())?;
    if let Some(secondary) = config.secondary_endpoint() {
        validate_url("secondary_endpoint", secondary)?;
    }

    validate_path("output_path", config.output_path())?;
    validate_file_name("output_file", config.output_file())?;

    validate_positive_number("max_datasets", config.max_datasets(), 1)?;
    validate_positive_number("qmi_limit", config.qmi_limit(), 1)?;
    validate_range(
        "concurrent_requests",
        config.concurrent_requests(),
        1,
        MAX_CONCURRENT_REQUESTS,
    )?;
    validate_positive_number(
        "rate_limit_per_second",
        config.rate_limit_per_second() as usize,
        1,
    )?;
    validate_positive_number(
        "request_timeout_secs",
        config.request_timeout().as_secs() as usize,
        1,
    )?;
    validate_positive_number("max_retries", config.max_retries() as usize, 1)?;
    validate_positive_number("qmi_max_retries", config.qmi_max_retries() as usize, 1)?;
    validate_positive_number("summary_sample_rows", config.summary_sample_rows(), 1)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;

    fn parse(extra: &[&str]) -> CliConfig {
        let mut args = vec!["ons-compendium"];
        args.extend_from_slice(extra);
        CliConfig::parse_from(args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.listing_endpoint(), DEFAULT_LISTING_ENDPOINT);
        assert_eq!(config.secondary_endpoint(), Some(DEFAULT_SECONDARY_ENDPOINT));
        assert_eq!(config.output_path(), "./output");
        assert_eq!(config.output_file(), "ons_datasets_metadata.csv");
        assert_eq!(config.max_datasets(), 500);
        assert_eq!(config.qmi_limit(), 1000);
        assert_eq!(config.concurrent_requests(), 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(500));
        assert_eq!(config.qmi_max_retries(), 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_skip_secondary() {
        let config = parse(&["--skip-secondary"]);
        assert_eq!(config.secondary_endpoint(), None);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = parse(&["--concurrent-requests", "0"]);
        match config.validate() {
            Err(EtlError::InvalidConfigValueError { field, .. }) => {
                assert_eq!(field, "concurrent_requests")
            }
            other => panic!("expected invalid concurrency, got {:?}", other),
        }

        assert!(parse(&["--concurrent-requests", "65"]).validate().is_err());
    }

    #[test]
    fn test_bad_endpoint_and_output_file_rejected() {
        assert!(parse(&["--listing-endpoint", "not a url"]).validate().is_err());
        assert!(parse(&["--output-file", "nested/out.csv"]).validate().is_err());
        assert!(parse(&["--max-retries", "0"]).validate().is_err());
    }
}
