use anyhow::Result;
use harvest_common::HarvestError;
use harvest_common::observability::init_logging;
use harvest_pipeline::{export_csv, extract_tweets};
use wiring::{build_clients, finish, load_config, log_config, run_params};
mod wiring;

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials usually live in a local .env; variables already set win
    dotenv::dotenv().ok();
    finish(run().await)
}

async fn run() -> Result<()> {
    // 1) Load config (env wins), then fail fast on missing credentials
    let cfg = load_config()?;

    let log_path = init_logging(log_config(&cfg.logging)?)?;
    tracing::debug!(path = %log_path.display(), "logging initialised");

    cfg.validate()
        .map_err(|e| HarvestError::Config(e.to_string()))?;

    let clients = build_clients(&cfg)?;
    let params = run_params(cfg.run.as_ref());
    let collection = cfg.storage.table.as_str();

    // 2) Extract; a rejected parameter set is logged and the run stops here
    match extract_tweets(&clients.social, &clients.store, collection, &params).await {
        Ok(summary) => {
            tracing::info!(
                fetched = summary.total_fetched(),
                api_calls = summary.api_calls,
                skipped = ?summary.skipped().collect::<Vec<_>>(),
                failed = ?summary.failed().collect::<Vec<_>>(),
                "run summary"
            );
        }
        Err(err) => {
            let err = HarvestError::Validation(err.to_string());
            tracing::error!(error = %err, "extraction failed: {err}");
            return Ok(());
        }
    }

    // 3) Export whatever the collection now holds
    if cfg.export.enabled {
        export_csv(&clients.store, collection, &cfg.export.path).await;
    }

    Ok(())
}
