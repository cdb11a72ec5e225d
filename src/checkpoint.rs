//! Batched checkpoint writing of assembled rows.
//!
//! Rows are buffered and written to numbered CSV chunk files every `chunk_size` triplets,
//! so only one chunk of rows is ever held in memory. Files use the pandas layout:
//! a header of column numbers, and an unnamed first column of row labels that readers drop.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::assembler::AssembledRow;
use crate::error::Error;

/// Suffix of the file holding the rows left over after the last full chunk.
pub const FINAL_CHUNK_SUFFIX: &str = "end";
pub const MERGED_SUFFIX: &str = "total";

pub fn chunk_path(directory: &Path, prefix: &str, chunk_number: usize) -> PathBuf
{
    directory.join(format!("{}_{}.csv", prefix, chunk_number))
}

pub fn final_chunk_path(directory: &Path, prefix: &str) -> PathBuf
{
    directory.join(format!("{}_{}.csv", prefix, FINAL_CHUNK_SUFFIX))
}

pub fn merged_path(directory: &Path, prefix: &str) -> PathBuf
{
    directory.join(format!("{}_{}.csv", prefix, MERGED_SUFFIX))
}

/// What a finished writer put on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary
{
    pub chunk_files: Vec<PathBuf>,
    pub final_file: PathBuf,
    pub rows_written: usize,
}

pub struct ChunkWriter
{
    directory: PathBuf,
    prefix: String,
    chunk_size: usize,
    buffer: Vec<AssembledRow>,
    chunk_files: Vec<PathBuf>,
    rows_written: usize,
    total_rows: Option<usize>,
}

impl ChunkWriter
{
    /// Creates the output directory if needed. Existing chunk files with the same prefix are overwritten.
    pub fn new(directory: &Path, prefix: &str, chunk_size: usize) -> Result<ChunkWriter, Error>
    {
        if chunk_size == 0 {
            return Err(Error::ZeroChunkSize);
        }
        std::fs::create_dir_all(directory)?;
        Ok(ChunkWriter {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            chunk_size,
            buffer: Vec::with_capacity(chunk_size),
            chunk_files: Vec::new(),
            rows_written: 0,
            total_rows: None,
        })
    }

    /// Expected number of rows, used only for progress logging.
    pub fn with_total_rows(mut self, total_rows: usize) -> ChunkWriter
    {
        self.total_rows = Some(total_rows);
        self
    }

    /// Buffers a row. When the row's index completes a chunk, the buffer is written
    /// and cleared, and the path of the new chunk file is returned.
    ///
    /// The check is on the row index, not on how many rows were pushed, so indices must be dense.
    pub fn push(&mut self, row: AssembledRow) -> Result<Option<PathBuf>, Error>
    {
        let completed = row.index + 1;
        self.buffer.push(row);
        if completed % self.chunk_size != 0 {
            return Ok(None);
        }

        let path = chunk_path(&self.directory, &self.prefix, completed / self.chunk_size);
        self.flush_to(&path)?;
        match self.total_rows
        {
            Some(total) if total > 0 => info!("{:?} written ({:.3} of rows)", path, completed as f64 / total as f64),
            _ => info!("{:?} written", path),
        }
        self.chunk_files.push(path.clone());
        Ok(Some(path))
    }

    /// Writes whatever is left, possibly nothing, to the final chunk file.
    pub fn finish(mut self) -> Result<ChunkSummary, Error>
    {
        let final_file = final_chunk_path(&self.directory, &self.prefix);
        self.flush_to(&final_file)?;
        info!("{:?} written, {} rows in {} files", final_file, self.rows_written, self.chunk_files.len() + 1);
        Ok(ChunkSummary {
            chunk_files: self.chunk_files,
            final_file,
            rows_written: self.rows_written,
        })
    }

    fn flush_to(&mut self, path: &Path) -> Result<(), Error>
    {
        write_rows(path, &self.buffer)?;
        debug!("Flushed {} rows to {:?}", self.buffer.len(), path);
        self.rows_written += self.buffer.len();
        self.buffer.clear();
        Ok(())
    }
}

/// Writes rows with a header of column numbers and a leading column of row labels.
/// An empty slice writes a header-only file.
pub fn write_rows(path: &Path, rows: &[AssembledRow]) -> Result<(), Error>
{
    let width = rows.first().map(|row| row.width()).unwrap_or(0);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header(width))?;
    for (label, row) in rows.iter().enumerate()
    {
        let mut record = Vec::with_capacity(row.width() + 1);
        record.push(label.to_string());
        record.push(row.index.to_string());
        record.extend(row.features.iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one label per row in the same layout as the feature chunks.
pub fn write_labels(path: &Path, labels: &[u8]) -> Result<(), Error>
{
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header(1))?;
    for (label, value) in labels.iter().enumerate()
    {
        writer.write_record(&[label.to_string(), value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn header(width: usize) -> Vec<String>
{
    std::iter::once(String::new())
        .chain((0..width).map(|column| column.to_string()))
        .collect()
}

/// Reads a chunk file back into rows, dropping the row label column.
pub fn read_chunk(path: &Path) -> Result<Vec<AssembledRow>, Error>
{
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for (row, record) in reader.records().enumerate()
    {
        let record = record?;
        let malformed = |reason: String| Error::ChunkShape { path: path.to_path_buf(), row, reason };

        if record.len() < 2 {
            return Err(malformed(format!("{} columns, expected at least 2", record.len())));
        }
        let index = record[1]
            .parse::<usize>()
            .map_err(|e| malformed(format!("bad index {:?}: {}", &record[1], e)))?;
        let features = record
            .iter()
            .skip(2)
            .map(|field| field.parse::<f32>().map_err(|e| malformed(format!("bad value {:?}: {}", field, e))))
            .collect::<Result<Vec<f32>, Error>>()?;
        rows.push(AssembledRow { index, features });
    }
    Ok(rows)
}

/// Concatenates the chunk files of one writer's run, in the order they were written,
/// followed by its final file, into `merged` with fresh row labels.
/// Files from earlier runs that share the prefix are not read. Returns the row count.
pub fn merge_chunks(summary: &ChunkSummary, merged: &Path) -> Result<usize, Error>
{
    let sources = summary.chunk_files.iter().chain(std::iter::once(&summary.final_file));

    let mut rows = Vec::with_capacity(summary.rows_written);
    for source in sources
    {
        let batch = read_chunk(source)?;
        debug!("Batch {:?} appended. Size: {}", source, batch.len());
        rows.extend(batch);
    }

    write_rows(merged, &rows)?;
    info!("Merged {} chunk files into {:?} ({} rows)", summary.chunk_files.len() + 1, merged, rows.len());
    Ok(rows.len())
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn row(index: usize) -> AssembledRow
    {
        AssembledRow { index, features: vec![index as f32, 0.5, -1.0] }
    }

    fn write_all(dir: &Path, total: usize, chunk_size: usize) -> ChunkSummary
    {
        let mut writer = ChunkWriter::new(dir, "x", chunk_size).unwrap().with_total_rows(total);
        for i in 0..total
        {
            writer.push(row(i)).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn chunk_counts_follow_threshold()
    {
        for (total, chunk_size) in [(0, 4), (3, 4), (4, 4), (9, 4), (12, 4), (7, 1)]
        {
            let dir = tempfile::tempdir().unwrap();
            let summary = write_all(dir.path(), total, chunk_size);

            assert_eq!(summary.chunk_files.len(), total / chunk_size);
            assert_eq!(summary.rows_written, total);
            for (i, path) in summary.chunk_files.iter().enumerate()
            {
                assert_eq!(path, &chunk_path(dir.path(), "x", i + 1));
                let rows = read_chunk(path).unwrap();
                let expected: Vec<usize> = (i * chunk_size..(i + 1) * chunk_size).collect();
                assert_eq!(rows.iter().map(|r| r.index).collect::<Vec<_>>(), expected);
            }
            assert!(summary.final_file.exists());
            assert_eq!(read_chunk(&summary.final_file).unwrap().len(), total % chunk_size);
        }
    }

    #[test]
    fn push_reports_flushed_chunk()
    {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), "x", 2).unwrap();
        assert_eq!(writer.push(row(0)).unwrap(), None);
        assert_eq!(writer.push(row(1)).unwrap(), Some(chunk_path(dir.path(), "x", 1)));
        assert_eq!(writer.push(row(2)).unwrap(), None);
        let summary = writer.finish().unwrap();
        assert_eq!(read_chunk(&summary.final_file).unwrap(), vec![row(2)]);
    }

    #[test]
    fn zero_chunk_size_is_rejected()
    {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ChunkWriter::new(dir.path(), "x", 0), Err(Error::ZeroChunkSize)));
    }

    #[test]
    fn file_layout_has_header_and_row_labels()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_rows(&path, &[row(7), row(8)]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, ",0,1,2,3\n0,7,7,0.5,-1\n1,8,8,0.5,-1\n");
    }

    #[test]
    fn labels_layout()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        write_labels(&path, &[1, 0, 1]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), ",0\n0,1\n1,0\n2,1\n");
    }

    #[test]
    fn merge_concatenates_in_chunk_order()
    {
        let dir = tempfile::tempdir().unwrap();
        let summary = write_all(dir.path(), 11, 3);

        let merged = merged_path(dir.path(), "x");
        assert_eq!(merge_chunks(&summary, &merged).unwrap(), 11);
        let rows = read_chunk(&merged).unwrap();
        assert_eq!(rows, (0..11).map(row).collect::<Vec<_>>());
    }

    #[test]
    fn merge_ignores_chunks_left_by_a_larger_run()
    {
        let dir = tempfile::tempdir().unwrap();
        let earlier = write_all(dir.path(), 9, 2);
        assert_eq!(earlier.chunk_files.len(), 4);

        let summary = write_all(dir.path(), 3, 2);
        assert!(chunk_path(dir.path(), "x", 4).exists());

        let merged = merged_path(dir.path(), "x");
        assert_eq!(merge_chunks(&summary, &merged).unwrap(), 3);
        let rows = read_chunk(&merged).unwrap();
        assert_eq!(rows, (0..3).map(row).collect::<Vec<_>>());
    }

    #[test]
    fn merge_with_missing_final_file_fails()
    {
        let dir = tempfile::tempdir().unwrap();
        let summary = write_all(dir.path(), 5, 2);
        std::fs::remove_file(&summary.final_file).unwrap();
        assert!(merge_chunks(&summary, &merged_path(dir.path(), "x")).is_err());
    }
}
