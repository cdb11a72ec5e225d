use log::info;

use crate::assembler;
use crate::cache::{self, FeatureCache};
use crate::checkpoint::{self, ChunkSummary};
use crate::config::PipelineConfig;
use crate::error::Error;
use crate::image_features::ImageEncoder;
use crate::triplets;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary
{
    pub images: usize,
    pub train: ChunkSummary,
    pub test: ChunkSummary,
}

/// Runs the whole pipeline: load (or extract) image features, read both triplet tables,
/// then write the training and test feature vectors.
///
/// Any error aborts the run. Chunk files written before the error are left on disk.
pub fn run<F, E>(config: &PipelineConfig, make_encoder: F) -> Result<PipelineSummary, Error>
where
    F: FnOnce() -> anyhow::Result<E>,
    E: ImageEncoder,
{
    let cache = FeatureCache::new(&config.features_cache_path, &config.identifiers_cache_path);
    let store = cache::load_or_extract(&cache, &config.image_directory, make_encoder)?;

    let mut train_triplets = triplets::read_triplets(&config.train_triplets_path)?;
    let test_triplets = triplets::read_triplets(&config.test_triplets_path)?;

    let labels = if config.balance_training {
        info!("Balancing training triplets with seed {}", config.random_seed);
        Some(triplets::balance_triplets(&mut train_triplets, config.random_seed))
    } else {
        None
    };

    let train = assembler::write_feature_vectors(
        &train_triplets,
        &store,
        &config.output_directory,
        &config.train_prefix,
        config.chunk_size,
    )?;
    // Only written once the training table has resolved.
    if let Some(labels) = labels {
        checkpoint::write_labels(&config.labels_path(), &labels)?;
    }

    let test = assembler::write_feature_vectors(
        &test_triplets,
        &store,
        &config.output_directory,
        &config.test_prefix,
        config.chunk_size,
    )?;

    if config.merge_chunks {
        checkpoint::merge_chunks(&train, &checkpoint::merged_path(&config.output_directory, &config.train_prefix))?;
        checkpoint::merge_chunks(&test, &checkpoint::merged_path(&config.output_directory, &config.test_prefix))?;
    }

    Ok(PipelineSummary { images: store.len(), train, test })
}
