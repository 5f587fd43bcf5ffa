use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::error;
use tracing_subscriber::EnvFilter;

use report_pipeline::config::{PipelineConfig, WindowConfig};
use report_pipeline::window::CutoffHour;
use report_pipeline::{ingest, pipeline};

#[derive(Parser)]
#[command(version, about = "Daily sales report export pipeline")]
struct Cli {
    /// Run the browser with a visible window (debugging).
    #[arg(long)]
    headful: bool,

    /// Override the configured business-day cutoff hour (1-23).
    #[arg(long, value_name = "HOUR")]
    cutoff_hour: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env()?;
    if let Some(hour) = cli.cutoff_hour {
        config.window = WindowConfig {
            cutoff: CutoffHour::new(hour)?,
            timezone: config.window.timezone,
        };
    }

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    ingest::ping(&pool).await?;
    ingest::ensure_schema(&pool).await?;

    // Any stage failure is logged with context and propagates as a non-zero
    // exit; there is no partial-success exit code.
    if let Err(err) = pipeline::run(&config, &pool, !cli.headful).await {
        error!(error = %err, "pipeline run failed");
        return Err(err.into());
    }
    Ok(())
}
