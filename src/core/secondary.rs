//! Dataset names from the Nomis SDMX definition document.
//!
//! Nomis needs dataset-specific dimension parameters before it will serve
//! any data, so only the names and descriptions are harvested here.

use crate::adapters::HttpFetcher;
use crate::core::extract::{json_path, json_path_str};
use crate::core::SecondaryDataset;
use crate::utils::error::{EtlError, Result};
use serde_json::Value;

pub const KEY_FAMILY_PATH: &str = "structure.keyfamilies.keyfamily";

pub fn parse_key_families(doc: &Value) -> Result<Vec<SecondaryDataset>> {
    let families = json_path(doc, KEY_FAMILY_PATH)
        .and_then(Value::as_array)
        .ok_or_else(|| EtlError::missing_field(KEY_FAMILY_PATH, "secondary definition document"))?;

    let mut datasets = Vec::with_capacity(families.len());
    for family in families {
        match json_path_str(family, "name.value") {
            Some(name) => datasets.push(SecondaryDataset {
                name: name.to_string(),
                description: json_path_str(family, "description.value").map(str::to_string),
            }),
            None => {
                let id = family.get("id").and_then(Value::as_str).unwrap_or("<no id>");
                tracing::debug!("Key family {} has no name, skipping", id);
            }
        }
    }

    Ok(datasets)
}

pub struct SecondaryLister {
    fetcher: HttpFetcher,
    url: String,
}

impl SecondaryLister {
    pub fn new(fetcher: HttpFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }

    pub async fn list(&self) -> Result<Vec<SecondaryDataset>> {
        let doc = self
            .fetcher
            .get_json(&self.url, &[], self.fetcher.retry_policy())
            .await?;
        let datasets = parse_key_families(&doc)?;
        tracing::info!("📡 Listed {} secondary datasets from {}", datasets.len(), self.url);
        Ok(datasets)
    }
}
