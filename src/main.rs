//! Realty Crew - HTTP Server Entry Point
//!
//! Serves the search form and the analysis API.

use std::sync::Arc;

use realty_crew::{api, config::Config, crew::CrewDefinition, pipeline::CrewPipeline};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; variables may come from the environment.
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realty_crew=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, report={}",
        config.llm.model,
        config.report_path.display()
    );
    let missing = config.credentials.missing();
    if !missing.is_empty() {
        warn!(
            "Missing API keys: {}. Runs will be refused until they are set.",
            missing.join(", ")
        );
    }

    let crew = CrewDefinition::load(config.crew_config_dir.as_deref())?;
    info!("Loaded crew with {} stages", crew.stages().len());
    let pipeline = CrewPipeline::new(config.clone(), crew)?;

    api::serve(config, Arc::new(pipeline)).await?;

    Ok(())
}
