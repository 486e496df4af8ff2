use crate::adapters::{FetcherSettings, HttpFetcher, RetryPolicy};
use crate::core::compendium::{assemble, manifest_file_name, write_csv, RunManifest};
use crate::core::detail::fetch_detail;
use crate::core::lister::PaginatedLister;
use crate::core::qmi::{align_qmi_urls, QmiScraper, TrimWindow};
use crate::core::secondary::SecondaryLister;
use crate::core::summarize::summarize;
use crate::core::table::download_table;
use crate::core::{
    Compendium, CompendiumRow, ConfigProvider, DatasetDetail, DatasetListing, Field,
    HarvestInput, HarvestWarning, Pipeline, SecondaryDataset, SourceKind, Storage,
};
use crate::utils::error::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};

/// Result of one dataset's detail → download → summary → narrative chain.
struct DatasetOutcome {
    row: CompendiumRow,
    warnings: Vec<HarvestWarning>,
    skipped_csv_rows: usize,
}

pub struct CompendiumPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    fetcher: HttpFetcher,
    lister: PaginatedLister,
    qmi: QmiScraper,
}

impl<S: Storage, C: ConfigProvider> CompendiumPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let fetcher = HttpFetcher::new(FetcherSettings {
            timeout: config.request_timeout(),
            concurrent_requests: config.concurrent_requests(),
            rate_limit_per_second: config.rate_limit_per_second(),
            retry: RetryPolicy::new(config.max_retries(), config.retry_base_delay()),
        })?;
        let lister = PaginatedLister::new(
            fetcher.clone(),
            config.listing_endpoint(),
            config.max_datasets(),
        );
        let qmi = QmiScraper::new(
            fetcher.clone(),
            TrimWindow {
                skip_leading: config.qmi_skip_leading(),
                skip_trailing: config.qmi_skip_trailing(),
                min_paragraph_chars: config.qmi_min_paragraph_chars(),
            },
        );

        Ok(Self {
            storage,
            config,
            fetcher,
            lister,
            qmi,
        })
    }

    async fn qmi_items(&self, warnings: &mut Vec<HarvestWarning>) -> Vec<serde_json::Value> {
        let policy = RetryPolicy::new(self.config.qmi_max_retries(), self.config.retry_base_delay());
        match self
            .lister
            .list_items_with_limit(self.config.qmi_limit(), &policy)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(
                    "❌ QMI item list unavailable, using links embedded in the listing: {}",
                    e
                );
                warnings.push(HarvestWarning::new(
                    self.lister.base_url(),
                    "qmi_items",
                    e.to_string(),
                ));
                Vec::new()
            }
        }
    }

    async fn secondary(&self, warnings: &mut Vec<HarvestWarning>) -> Vec<SecondaryDataset> {
        let Some(url) = self.config.secondary_endpoint() else {
            return Vec::new();
        };

        match SecondaryLister::new(self.fetcher.clone(), url).list().await {
            Ok(datasets) => datasets,
            Err(e) => {
                tracing::warn!("⚠️ Secondary source {} skipped: {}", url, e);
                warnings.push(HarvestWarning::new(url, "secondary", e.to_string()));
                Vec::new()
            }
        }
    }

    async fn detail_for(
        &self,
        listing: &DatasetListing,
        warnings: &mut Vec<HarvestWarning>,
    ) -> DatasetDetail {
        let label = listing.label();
        let url = match listing.detail_url() {
            Ok(url) => url,
            Err(e) => {
                warnings.push(HarvestWarning::new(label, "listing", e.to_string()));
                return DatasetDetail::none();
            }
        };

        match fetch_detail(&self.fetcher, url).await {
            Ok(detail) => detail,
            Err(e) => {
                warnings.push(HarvestWarning::new(label, "detail", e.to_string()));
                DatasetDetail::none()
            }
        }
    }

    async fn harvest_dataset(
        &self,
        listing: &DatasetListing,
        qmi_url: Option<&str>,
    ) -> DatasetOutcome {
        let mut warnings = Vec::new();
        let detail = self.detail_for(listing, &mut warnings).await;

        let mut columns = Field::Unavailable;
        let mut unique_parameters = Field::Unavailable;
        let mut skipped_csv_rows = 0;
        if let Some(url) = detail.download_url.as_deref() {
            match download_table(&self.fetcher, url).await {
                Ok(table) => {
                    skipped_csv_rows = table.skipped_rows;
                    unique_parameters =
                        Field::Present(summarize(&table, self.config.summary_sample_rows()));
                    columns = Field::Present(table.columns);
                }
                Err(e) => {
                    warnings.push(HarvestWarning::new(listing.label(), "download", e.to_string()));
                }
            }
        }

        let long_description = self.qmi.scrape(qmi_url).await;

        for warning in &warnings {
            tracing::warn!(
                "⚠️ {}: {} unavailable: {}",
                warning.dataset,
                warning.stage,
                warning.message
            );
        }

        DatasetOutcome {
            row: CompendiumRow {
                title: Field::from_option(listing.title.clone()),
                description: Field::from_option(listing.description.clone()),
                long_description,
                columns,
                unique_parameters,
                latest_release: Field::from_option(detail.release_date),
                source: SourceKind::Ons,
            },
            warnings,
            skipped_csv_rows,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for CompendiumPipeline<S, C> {
    async fn extract(&self) -> Result<HarvestInput> {
        tracing::info!("🚀 Checking connectivity to {}", self.lister.base_url());
        self.lister.probe().await?;

        let listings: Vec<DatasetListing> = self
            .lister
            .list_items()
            .await?
            .iter()
            .map(DatasetListing::from_item)
            .collect();

        let mut warnings = Vec::new();
        let qmi_items = self.qmi_items(&mut warnings).await;
        let qmi_urls = align_qmi_urls(&listings, &qmi_items);
        let secondary = self.secondary(&mut warnings).await;

        Ok(HarvestInput {
            listings,
            qmi_urls,
            secondary,
            warnings,
        })
    }

    async fn transform(&self, input: HarvestInput) -> Result<Compendium> {
        let HarvestInput {
            listings,
            qmi_urls,
            secondary,
            mut warnings,
        } = input;

        let total = listings.len();
        let chains: Vec<_> = listings
            .iter()
            .enumerate()
            .map(|(position, listing)| {
                let qmi_url = qmi_urls.get(position).and_then(|u| u.as_deref());
                self.harvest_dataset(listing, qmi_url)
            })
            .collect();
        let outcomes: Vec<DatasetOutcome> = stream::iter(chains)
            .buffered(self.config.concurrent_requests().max(1))
            .collect()
            .await;

        let mut primary = Vec::with_capacity(total);
        let mut skipped_csv_rows = 0;
        for outcome in outcomes {
            skipped_csv_rows += outcome.skipped_csv_rows;
            warnings.extend(outcome.warnings);
            primary.push(outcome.row);
        }

        let complete = primary.iter().filter(|r| r.columns.is_present()).count();
        tracing::info!(
            "📊 Harvested {} datasets ({} with column data), {} warnings",
            total,
            complete,
            warnings.len()
        );

        Ok(Compendium {
            rows: assemble(primary, &secondary),
            warnings,
            skipped_csv_rows,
        })
    }

    async fn load(&self, compendium: Compendium) -> Result<String> {
        let output_file = self.config.output_file();
        let csv = write_csv(&compendium.rows)?;
        tracing::debug!("Writing {} rows ({} bytes) to {}", compendium.rows.len(), csv.len(), output_file);
        self.storage.write_file(output_file, &csv).await?;

        let manifest = RunManifest::for_compendium(&compendium, Utc::now());
        self.storage
            .write_file(&manifest_file_name(output_file), &manifest.to_json()?)
            .await?;

        Ok(self.storage.location(output_file))
    }
}
