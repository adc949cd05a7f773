use std::time::Duration;

use argentum::{CaptureConfig, HttpRenderer, Pipeline};
use dotenv::dotenv;

extern crate env_logger;
extern crate log;

use log::LevelFilter;

use log::{error, info};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = run().await {
        error!("capture run failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = CaptureConfig::load()?;
    std::fs::create_dir_all(&config.csv_dir)?;
    std::fs::create_dir_all(&config.screenshot_dir)?;

    info!("starting silver price capture for {}", config.target_url);
    let renderer = HttpRenderer::new(
        Duration::from_secs(config.render_timeout_secs),
        config.ready_marker.clone(),
    )?;
    let pipeline = Pipeline::new(&config)?;
    let report = pipeline.run(&renderer).await?;

    info!(
        "recorded price {} for {} -> {}",
        report.record.price,
        report.record.trade_date,
        report.partition.display()
    );
    Ok(())
}
