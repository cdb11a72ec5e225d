use std::path::Path;

use log::info;

use crate::checkpoint::{ChunkSummary, ChunkWriter};
use crate::error::Error;
use crate::image_features::FeatureStore;
use crate::triplets::Triplet;

/// A triplet's index followed by the feature vectors of A, B, and C, in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRow
{
    pub index: usize,
    pub features: Vec<f32>,
}

impl AssembledRow
{
    /// Number of columns: the index plus every feature value.
    pub fn width(&self) -> usize
    {
        1 + self.features.len()
    }
}

/// A triplet whose identifiers have been looked up in the feature store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTriplet
{
    pub index: usize,
    pub a: usize,
    pub b: usize,
    pub c: usize,
}

/// Looks up every identifier of every triplet. Fails on the first identifier the store does not contain.
pub fn resolve(triplets: &[Triplet], store: &FeatureStore) -> Result<Vec<ResolvedTriplet>, Error>
{
    let lookup = |identifier: &str, row: usize| {
        store.position(identifier).ok_or_else(|| Error::UnknownIdentifier { identifier: identifier.to_string(), row })
    };

    triplets.iter().map(|t| -> Result<ResolvedTriplet, Error> {
        Ok(ResolvedTriplet {
            index: t.index,
            a: lookup(&t.a, t.index)?,
            b: lookup(&t.b, t.index)?,
            c: lookup(&t.c, t.index)?,
        })
    }).collect()
}

pub fn assemble_row(triplet: &ResolvedTriplet, store: &FeatureStore) -> AssembledRow
{
    let (a, b, c) = (store.vector(triplet.a), store.vector(triplet.b), store.vector(triplet.c));
    let mut features = Vec::with_capacity(a.len() + b.len() + c.len());
    features.extend_from_slice(a);
    features.extend_from_slice(b);
    features.extend_from_slice(c);
    AssembledRow { index: triplet.index, features }
}

pub fn assemble_rows<'a>(resolved: &'a [ResolvedTriplet], store: &'a FeatureStore) -> impl Iterator<Item = AssembledRow> + 'a
{
    resolved.iter().map(move |triplet| assemble_row(triplet, store))
}

/// Assembles a row for every triplet and writes them in chunks of `chunk_size`
/// to `<directory>/<prefix>_<n>.csv`, with the remainder in `<prefix>_end.csv`.
///
/// All identifiers are resolved before anything is written, so an unknown
/// identifier leaves no files behind for this table.
pub fn write_feature_vectors(
    triplets: &[Triplet],
    store: &FeatureStore,
    directory: &Path,
    prefix: &str,
    chunk_size: usize,
) -> Result<ChunkSummary, Error>
{
    info!("Creating feature vectors for {:?} ({} triplets)...", prefix, triplets.len());
    let now = std::time::Instant::now();

    let resolved = resolve(triplets, store)?;

    let mut writer = ChunkWriter::new(directory, prefix, chunk_size)?.with_total_rows(resolved.len());
    for row in assemble_rows(&resolved, store)
    {
        writer.push(row)?;
    }
    let summary = writer.finish()?;

    info!("Feature vectors for {:?} done in {:?}", prefix, now.elapsed());
    Ok(summary)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::checkpoint::read_chunk;

    fn one_hot_store() -> FeatureStore
    {
        FeatureStore::from_parts(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
            ],
        ).unwrap()
    }

    #[test]
    fn single_triplet_row()
    {
        let dir = tempfile::tempdir().unwrap();
        let store = one_hot_store();
        let triplets = vec![Triplet::new(0, "a", "b", "c")];

        let summary = write_feature_vectors(&triplets, &store, dir.path(), "x_train", 10000).unwrap();
        assert!(summary.chunk_files.is_empty());

        let rows = read_chunk(&summary.final_file).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].features, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn rows_follow_table_order_and_width()
    {
        let store = one_hot_store();
        let triplets = vec![
            Triplet::new(0, "c", "a", "b"),
            Triplet::new(1, "a", "a", "a"),
            Triplet::new(2, "b", "c", "a"),
        ];

        let resolved = resolve(&triplets, &store).unwrap();
        let rows: Vec<AssembledRow> = assemble_rows(&resolved, &store).collect();

        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate()
        {
            assert_eq!(row.index, i);
            assert_eq!(row.width(), 1 + 3 * 4);
        }
        // Concatenation is always A, B, C.
        assert_eq!(&rows[0].features[..4], store.get("c").unwrap());
        assert_eq!(&rows[0].features[4..8], store.get("a").unwrap());
        assert_eq!(&rows[0].features[8..], store.get("b").unwrap());
    }

    #[test]
    fn unknown_identifier_fails_without_output()
    {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let store = one_hot_store();
        let mut triplets: Vec<Triplet> = (0..5).map(|i| Triplet::new(i, "a", "b", "c")).collect();
        triplets.push(Triplet::new(5, "a", "zzz", "c"));

        let err = write_feature_vectors(&triplets, &store, &out, "x_train", 2).unwrap_err();
        assert!(matches!(err, Error::UnknownIdentifier { ref identifier, row: 5 } if identifier == "zzz"));
        assert!(!out.exists());
    }

    #[test]
    fn chunked_output_covers_every_triplet()
    {
        let dir = tempfile::tempdir().unwrap();
        let store = one_hot_store();
        let triplets: Vec<Triplet> = (0..7).map(|i| Triplet::new(i, "a", "b", "c")).collect();

        let summary = write_feature_vectors(&triplets, &store, dir.path(), "x_test", 3).unwrap();
        assert_eq!(summary.chunk_files.len(), 2);
        assert_eq!(summary.rows_written, 7);

        let mut indices = Vec::new();
        for path in summary.chunk_files.iter().chain(std::iter::once(&summary.final_file))
        {
            indices.extend(read_chunk(path).unwrap().into_iter().map(|r| r.index));
        }
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
    }
}
