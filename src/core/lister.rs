//! Page-by-page walk of the primary listing endpoint.
//!
//! `GET {base}?offset=N` answers `{"items": [...], "count": n}`; the walk
//! advances the offset by `count` and stops on an empty page or once the
//! configured ceiling is reached.

use crate::adapters::{HttpFetcher, RetryPolicy};
use crate::utils::error::{EtlError, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub items: Vec<Value>,
    pub count: usize,
}

impl ListingPage {
    pub fn from_document(doc: &Value) -> Result<Self> {
        let items = doc
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| EtlError::missing_field("items", "listing page"))?;
        let count = doc
            .get("count")
            .and_then(Value::as_u64)
            .map(|c| c as usize)
            .unwrap_or(items.len());

        Ok(Self { items, count })
    }

    pub fn is_last(&self) -> bool {
        self.count == 0 || self.items.is_empty()
    }
}

pub struct PaginatedLister {
    fetcher: HttpFetcher,
    base_url: String,
    ceiling: usize,
}

impl PaginatedLister {
    pub fn new(fetcher: HttpFetcher, base_url: impl Into<String>, ceiling: usize) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            ceiling,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cheap one-item request; failing it ends the run.
    pub async fn probe(&self) -> Result<()> {
        self.fetcher
            .probe(&self.base_url, &[("limit", "1".to_string())])
            .await?;
        tracing::debug!("Connectivity check against {} passed", self.base_url);
        Ok(())
    }

    pub async fn list_items(&self) -> Result<Vec<Value>> {
        let policy = self.fetcher.retry_policy().clone();
        let mut items: Vec<Value> = Vec::new();
        let mut offset = 0usize;

        while items.len() < self.ceiling {
            let doc = self
                .fetcher
                .get_json(&self.base_url, &[("offset", offset.to_string())], &policy)
                .await?;
            let page = ListingPage::from_document(&doc)?;

            if page.is_last() {
                tracing::debug!("Listing exhausted at offset {}", offset);
                break;
            }

            tracing::debug!("Page at offset {} returned {} items", offset, page.items.len());
            offset += page.count;
            items.extend(page.items);
        }

        if items.len() > self.ceiling {
            tracing::info!(
                "Listing reached the ceiling of {} datasets, dropping {}",
                self.ceiling,
                items.len() - self.ceiling
            );
            items.truncate(self.ceiling);
        }

        tracing::info!("📡 Listed {} datasets from {}", items.len(), self.base_url);
        Ok(items)
    }

    /// Single request with a `limit` parameter instead of pagination.
    pub async fn list_items_with_limit(
        &self,
        limit: usize,
        policy: &RetryPolicy,
    ) -> Result<Vec<Value>> {
        let doc = self
            .fetcher
            .get_json(&self.base_url, &[("limit", limit.to_string())], policy)
            .await?;
        Ok(ListingPage::from_document(&doc)?.items)
    }
}
