use anyhow::Context;
use clap::Parser;
use ons_compendium::core::ConfigProvider;
use ons_compendium::utils::error::ErrorSeverity;
use ons_compendium::utils::{logger, validation::Validate};
use ons_compendium::{CliConfig, CompendiumPipeline, EtlEngine, LocalStorage, TomlConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting ons-compendium");

    let exit_code = match cli.config.as_deref() {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            let config = TomlConfig::from_file(path)
                .with_context(|| format!("failed to load config file '{}'", path))?;
            run(config).await
        }
        None => {
            if cli.verbose {
                tracing::debug!("CLI config: {:?}", cli);
            }
            run(cli).await
        }
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run<C: ConfigProvider + Validate>(config: C) -> i32 {
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        return 1;
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = match CompendiumPipeline::new(storage, config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("❌ Could not build the HTTP client: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            return 1;
        }
    };

    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Harvest completed successfully!");
            println!("✅ Harvest completed successfully!");
            println!("📁 Output saved to: {}", output_path);
            0
        }
        Err(e) => {
            tracing::error!(
                "❌ Harvest failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            match e.severity() {
                ErrorSeverity::Low | ErrorSeverity::High => 1,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::Critical => 3,
            }
        }
    }
}
