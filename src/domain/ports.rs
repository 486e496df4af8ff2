use crate::domain::model::{Compendium, HarvestInput};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Where `path` ends up, for log lines and the engine's return value.
    fn location(&self, path: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn listing_endpoint(&self) -> &str;
    fn secondary_endpoint(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    fn output_file(&self) -> &str;
    fn max_datasets(&self) -> usize;
    fn qmi_limit(&self) -> usize;
    fn concurrent_requests(&self) -> usize;
    fn rate_limit_per_second(&self) -> u32;
    fn request_timeout(&self) -> Duration;
    fn max_retries(&self) -> u32;
    fn qmi_max_retries(&self) -> u32;
    fn retry_base_delay(&self) -> Duration;
    fn qmi_skip_leading(&self) -> usize;
    fn qmi_skip_trailing(&self) -> usize;
    fn qmi_min_paragraph_chars(&self) -> usize;
    fn summary_sample_rows(&self) -> usize;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<HarvestInput>;
    async fn transform(&self, input: HarvestInput) -> Result<Compendium>;
    async fn load(&self, compendium: Compendium) -> Result<String>;
}
