use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use ndarray::{Array2, Array4};
use rustc_hash::FxHashMap;
use walkdir::WalkDir;

use crate::error::Error;
use crate::preprocessing;

/// Number of files decoded and resized together before inference.
pub const PREPROCESS_BATCH_SIZE: usize = 32;

/// A model that maps a preprocessed image batch of shape (batch, height, width, channels)
/// to one feature vector per image, returned as a 2D array of shape (batch, feature_width()).
pub trait ImageEncoder
{
    fn feature_width(&self) -> usize;

    fn encode_image(&self, images: Array4<f32>) -> anyhow::Result<Array2<f32>>;
}

/// The feature store: image identifiers and their feature vectors, kept in two
/// parallel collections so the identifier at position i belongs to the vector at position i.
///
/// Identifiers are filename stems. If the same stem occurs more than once, both records
/// are kept but lookups resolve to the first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureStore
{
    identifiers: Vec<String>,
    vectors: Vec<Vec<f32>>,
    positions: FxHashMap<String, usize>,
}

impl FeatureStore
{
    pub fn new() -> FeatureStore
    {
        FeatureStore::default()
    }

    /// Builds a store from parallel collections, such as those read back from the cache.
    pub fn from_parts(identifiers: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<FeatureStore, Error>
    {
        if identifiers.len() != vectors.len() {
            return Err(Error::MismatchedFeatureStore { identifiers: identifiers.len(), vectors: vectors.len() });
        }
        let mut store = FeatureStore::new();
        for (identifier, vector) in identifiers.into_iter().zip(vectors.into_iter())
        {
            store.push(identifier, vector)?;
        }
        Ok(store)
    }

    /// Appends a record. Fails if the vector width differs from the vectors already stored.
    pub fn push(&mut self, identifier: String, vector: Vec<f32>) -> Result<(), Error>
    {
        if let Some(expected) = self.feature_width() {
            if vector.len() != expected {
                return Err(Error::FeatureWidth { identifier, expected, found: vector.len() });
            }
        }

        let position = self.identifiers.len();
        if self.positions.contains_key(&identifier) {
            warn!("Duplicate image identifier {:?}; lookups will use the first occurrence", identifier);
        } else {
            self.positions.insert(identifier.clone(), position);
        }
        self.identifiers.push(identifier);
        self.vectors.push(vector);
        Ok(())
    }

    pub fn position(&self, identifier: &str) -> Option<usize>
    {
        self.positions.get(identifier).copied()
    }

    pub fn get(&self, identifier: &str) -> Option<&[f32]>
    {
        self.position(identifier).map(|position| self.vector(position))
    }

    /// Panics if `position` is out of bounds; positions come from `position()`.
    pub fn vector(&self, position: usize) -> &[f32]
    {
        &self.vectors[position]
    }

    pub fn feature_width(&self) -> Option<usize>
    {
        self.vectors.first().map(|v| v.len())
    }

    pub fn len(&self) -> usize
    {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.identifiers.is_empty()
    }

    pub fn identifiers(&self) -> &[String]
    {
        &self.identifiers
    }

    pub fn vectors(&self) -> &[Vec<f32>]
    {
        &self.vectors
    }
}

/// Extracts a feature vector for every image in `image_directory` (not recursive),
/// in the order the filesystem lists them.
///
/// A file that cannot be decoded or encoded is logged and skipped; it never aborts the run.
/// Only failing to read the directory itself is an error.
pub fn extract_features<E: ImageEncoder + ?Sized>(image_directory: &Path, encoder: &E) -> Result<FeatureStore, Error>
{
    info!("Extracting image features from {:?}...", image_directory);
    let now = std::time::Instant::now();

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(image_directory).min_depth(1).max_depth(1)
    {
        match entry
        {
            Ok(entry) => paths.push(entry.into_path()),
            Err(e) => {
                // The directory itself being unreadable shows up here at depth 0.
                if e.depth() == 0 {
                    return Err(e.into());
                }
                warn!("Skipping unreadable directory entry: {}", e);
            }
        }
    }

    let mut store = FeatureStore::new();
    let mut failures = 0;
    for chunk in paths.chunks(PREPROCESS_BATCH_SIZE)
    {
        for (path, image) in preprocessing::load_image_batch(chunk)
        {
            match encode_one(&path, image, encoder)
            {
                Ok((identifier, vector)) => {
                    if let Err(e) = store.push(identifier, vector) {
                        failures += 1;
                        warn!("Skipping image {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    failures += 1;
                    warn!("Skipping image {:?}: {:?}", path, e);
                }
            }
        }
        debug!("Extracted features for {} of {} files", store.len(), paths.len());
    }

    info!(
        "Extracted {} feature vectors ({} files skipped) in {:?}",
        store.len(),
        failures,
        now.elapsed()
    );

    Ok(store)
}

fn encode_one<E: ImageEncoder + ?Sized>(
    path: &Path,
    image: anyhow::Result<Array4<f32>>,
    encoder: &E,
) -> anyhow::Result<(String, Vec<f32>)>
{
    let identifier = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or(anyhow::anyhow!("File name is not valid UTF-8: {:?}", path))?
        .to_string();

    let features = encoder.encode_image(image?)?;
    if features.nrows() != 1 || features.ncols() != encoder.feature_width() {
        anyhow::bail!(
            "Unexpected feature shape {:?}, expected [1, {}]",
            features.shape(),
            encoder.feature_width()
        );
    }

    Ok((identifier, features.row(0).to_vec()))
}
