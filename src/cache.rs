//! On-disk cache of the feature store.
//!
//! The store is persisted as two bincode artifacts, the feature vectors and the image
//! identifiers, so that feature extraction only runs once per image directory.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::image_features::{self, FeatureStore, ImageEncoder};

/// Why the cache could not be used. Each of these triggers re-extraction.
#[derive(Debug, thiserror::Error)]
pub enum CacheMiss {
    #[error("cache artifact {0:?} does not exist")]
    Missing(PathBuf),
    #[error("cache artifact {path:?} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("cache artifacts are inconsistent: {0}")]
    Inconsistent(String),
}

pub struct FeatureCache
{
    pub features_path: PathBuf,
    pub identifiers_path: PathBuf,
}

impl FeatureCache
{
    pub fn new(features_path: impl Into<PathBuf>, identifiers_path: impl Into<PathBuf>) -> FeatureCache
    {
        FeatureCache { features_path: features_path.into(), identifiers_path: identifiers_path.into() }
    }

    /// Loads both artifacts. There is no partial load: if either is unusable the whole cache is a miss.
    pub fn load(&self) -> Result<FeatureStore, CacheMiss>
    {
        let vectors: Vec<Vec<f32>> = read_artifact(&self.features_path)?;
        let identifiers: Vec<String> = read_artifact(&self.identifiers_path)?;
        FeatureStore::from_parts(identifiers, vectors)
            .map_err(|e| CacheMiss::Inconsistent(e.to_string()))
    }

    pub fn save(&self, store: &FeatureStore) -> Result<(), Error>
    {
        write_artifact(&self.features_path, store.vectors())?;
        write_artifact(&self.identifiers_path, store.identifiers())?;
        info!("Saved {} feature vectors to {:?}", store.len(), self.features_path);
        Ok(())
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, CacheMiss>
{
    let file = File::open(path).map_err(|e| match e.kind()
    {
        ErrorKind::NotFound => CacheMiss::Missing(path.to_path_buf()),
        _ => CacheMiss::Unreadable { path: path.to_path_buf(), reason: e.to_string() },
    })?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|e| CacheMiss::Unreadable { path: path.to_path_buf(), reason: e.to_string() })
}

fn write_artifact<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error>
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Returns the cached feature store, or extracts features from `image_directory` and caches them.
///
/// The encoder is only constructed on a cache miss, since loading the model is slow.
pub fn load_or_extract<F, E>(cache: &FeatureCache, image_directory: &Path, make_encoder: F) -> Result<FeatureStore, Error>
where
    F: FnOnce() -> anyhow::Result<E>,
    E: ImageEncoder,
{
    match cache.load()
    {
        Ok(store) => {
            info!("Loaded {} preexisting feature vectors from {:?}", store.len(), cache.features_path);
            Ok(store)
        },
        Err(miss) => {
            match &miss
            {
                CacheMiss::Missing(_) => info!("No feature cache: {}", miss),
                _ => warn!("Ignoring feature cache: {}", miss),
            }
            let encoder = make_encoder()?;
            let store = image_features::extract_features(image_directory, &encoder)?;
            cache.save(&store)?;
            Ok(store)
        }
    }
}
