use crate::adapters::HttpFetcher;
use crate::core::extract::json_path_str;
use crate::core::DatasetDetail;
use crate::utils::error::Result;
use serde_json::Value;

pub const CSV_DOWNLOAD_PATH: &str = "downloads.csv.href";

impl DatasetDetail {
    /// A document without `downloads.csv.href` is a dataset with no CSV, not a
    /// malformed response.
    pub fn from_document(doc: &Value) -> Self {
        Self {
            download_url: json_path_str(doc, CSV_DOWNLOAD_PATH).map(str::to_string),
            release_date: json_path_str(doc, "release_date").map(str::to_string),
        }
    }
}

pub async fn fetch_detail(fetcher: &HttpFetcher, detail_url: &str) -> Result<DatasetDetail> {
    let doc = fetcher
        .get_json(detail_url, &[], fetcher.retry_policy())
        .await?;
    let detail = DatasetDetail::from_document(&doc);
    if !detail.has_download() {
        tracing::debug!("No CSV download listed at {}", detail_url);
    }
    Ok(detail)
}
