use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// File the binary looks for in the working directory.
pub const CONFIG_FILE: &str = "pipeline.json";

pub const DEFAULT_CHUNK_SIZE: usize = 10000;
pub const DEFAULT_RANDOM_SEED: u64 = 4;

/// Locations and constants for a pipeline run.
/// Every field has a default, so a config file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig
{
    pub image_directory: PathBuf,
    /// ONNX export of ResNet50 with global average pooling and no classification layer.
    pub model_path: PathBuf,
    pub features_cache_path: PathBuf,
    pub identifiers_cache_path: PathBuf,
    pub train_triplets_path: PathBuf,
    pub test_triplets_path: PathBuf,
    pub output_directory: PathBuf,
    pub train_prefix: String,
    pub test_prefix: String,
    pub chunk_size: usize,
    /// Seed for the balancing stage. Nothing else in the pipeline is random.
    pub random_seed: u64,
    pub balance_training: bool,
    pub merge_chunks: bool,
}

impl Default for PipelineConfig
{
    fn default() -> Self
    {
        PipelineConfig {
            image_directory: PathBuf::from("food"),
            model_path: PathBuf::from("models").join("resnet50_avg_pool.onnx"),
            features_cache_path: PathBuf::from("image_features_ResNet50_avg_pooling.bin"),
            identifiers_cache_path: PathBuf::from("image_list_ResNet50_avg_pooling.bin"),
            train_triplets_path: PathBuf::from("train_triplets.txt"),
            test_triplets_path: PathBuf::from("test_triplets.txt"),
            output_directory: PathBuf::from("ResNet50_features"),
            train_prefix: "x_train_Resnet50_avg_pool".to_string(),
            test_prefix: "x_test_Resnet50_avg_pool".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            random_seed: DEFAULT_RANDOM_SEED,
            balance_training: false,
            merge_chunks: false,
        }
    }
}

impl PipelineConfig
{
    /// Reads the config from a JSON file, or returns the defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, Error>
    {
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(PipelineConfig::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&contents)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn labels_path(&self) -> PathBuf
    {
        self.output_directory.join("y_train_labels.csv")
    }
}
