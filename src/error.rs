use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error("Identifier {identifier:?} in triplet row {row} has no entry in the feature store")]
    UnknownIdentifier { identifier: String, row: usize },
    #[error("Triplet table {path:?} line {line} has {fields} fields, expected 3")]
    MalformedTriplet { path: PathBuf, line: u64, fields: usize },
    #[error("Feature store has {identifiers} identifiers but {vectors} feature vectors")]
    MismatchedFeatureStore { identifiers: usize, vectors: usize },
    #[error("Feature vector for {identifier:?} has length {found}, expected {expected}")]
    FeatureWidth { identifier: String, expected: usize, found: usize },
    #[error("The chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("Chunk file {path:?} row {row} is malformed: {reason}")]
    ChunkShape { path: PathBuf, row: usize, reason: String },
}
