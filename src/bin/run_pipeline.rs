//! One-shot run of the crew with the default filters.
//!
//! Prints the final report to stdout; logs go to stderr.

use realty_crew::{
    config::Config,
    crew::CrewDefinition,
    filters::FilterInput,
    pipeline::{CrewPipeline, ReportPipeline},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realty_crew=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    config.credentials.require()?;

    let filters = FilterInput::default().validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::anyhow!("invalid default filters: {}", messages.join("; "))
    })?;
    info!("Running crew with {:?}", filters);

    let crew = CrewDefinition::load(config.crew_config_dir.as_deref())?;
    let pipeline = CrewPipeline::new(config, crew)?;
    let result = pipeline.run(&filters).await?;

    for warning in &result.warnings {
        tracing::warn!("{}", warning);
    }

    println!("\n\n########################");
    println!("## Here is the result of your crew run:");
    println!("########################\n");
    println!("{}", result.report);

    Ok(())
}
