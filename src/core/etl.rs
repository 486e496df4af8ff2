use crate::core::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("Starting compendium harvest...");

        // Extract
        let input = self.pipeline.extract().await?;
        tracing::info!(
            "Listed {} datasets, {} secondary definitions ({:?})",
            input.listings.len(),
            input.secondary.len(),
            started.elapsed()
        );

        // Transform
        let compendium = self.pipeline.transform(input).await?;
        tracing::info!(
            "Assembled {} compendium rows ({:?})",
            compendium.rows.len(),
            started.elapsed()
        );

        // Load
        let output_path = self.pipeline.load(compendium).await?;
        tracing::info!("Output saved to: {} ({:?})", output_path, started.elapsed());

        Ok(output_path)
    }
}
