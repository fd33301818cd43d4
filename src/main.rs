use clap::Parser;
use lca_align::domain::ports::ConfigProvider;
use lca_align::utils::error::ErrorSeverity;
use lca_align::utils::{logger, validation::Validate};
use lca_align::{
    build_selector, AlignConfig, AlignmentEngine, AlignmentPipeline, CandidateSelector,
    CliConfig, HttpFlowSearch, LocalStorage, Result,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting lca-align CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let outcome = match cli.config.clone() {
        Some(path) => run_with_toml(&path).await,
        None => run_with_cli(cli).await,
    };

    match outcome {
        Ok(output_path) => {
            tracing::info!("✅ Alignment completed successfully!");
            println!("✅ Alignment completed successfully!");
            println!("📁 Report saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Alignment failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn run_with_toml(path: &str) -> Result<String> {
    tracing::info!("📄 Loading configuration from {}", path);
    let config = AlignConfig::from_file(path)?;
    config.validate()?;

    let search = HttpFlowSearch::new(config.search_endpoint(), config.search_request_timeout())?
        .with_headers(config.search_headers());
    let selector = build_selector(config.selector_strategy(), config.chat_model())?;

    run(config, search, selector).await
}

async fn run_with_cli(cli: CliConfig) -> Result<String> {
    cli.validate()?;

    let search = HttpFlowSearch::new(cli.search_endpoint.clone(), None)?;
    let selector = build_selector(cli.selector, Some(cli.chat_model()))?;

    run(cli, search, selector).await
}

async fn run<C: ConfigProvider>(
    config: C,
    search: HttpFlowSearch,
    selector: Option<CandidateSelector>,
) -> Result<String> {
    if selector.is_none() {
        tracing::info!("Candidate selection disabled, keeping every search hit");
    }

    let storage = LocalStorage::new(".");
    let pipeline = AlignmentPipeline::new(storage, config, Arc::new(search)).with_selector(selector);
    let engine = AlignmentEngine::new(pipeline);

    engine.run().await
}
