use std::path::Path;

use anyhow::Context;
use log::info;
use tracing_subscriber::filter::LevelFilter;

use triplet_features::config::{PipelineConfig, CONFIG_FILE};
use triplet_features::pipeline;
use triplet_features::resnet::ResNet50;

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::DEBUG;
#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::INFO;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LOG_LEVEL)
        .init();

    let config = PipelineConfig::load(Path::new(CONFIG_FILE))?;

    let now = std::time::Instant::now();
    let summary = pipeline::run(&config, || {
        info!("Loading ResNet50 from {:?}", config.model_path);
        ResNet50::new(&config.model_path)
            .with_context(|| format!("Unable to load model {:?}", config.model_path))
    })?;

    info!(
        "Done in {:?}: {} images, {} training rows, {} test rows",
        now.elapsed(),
        summary.images,
        summary.train.rows_written,
        summary.test.rows_written
    );

    Ok(())
}
