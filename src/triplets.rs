use std::path::Path;

use log::info;
use rand::{rngs::StdRng, seq::index::sample, SeedableRng};

use crate::error::Error;

/// One line of a triplet table: is B or C closer in taste to A?
/// `index` is the line's position in the table, starting at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triplet
{
    pub index: usize,
    pub a: String,
    pub b: String,
    pub c: String,
}

impl Triplet
{
    pub fn new(index: usize, a: &str, b: &str, c: &str) -> Triplet
    {
        Triplet { index, a: a.to_string(), b: b.to_string(), c: c.to_string() }
    }
}

/// Reads a whitespace-delimited table of `A B C` lines with no header.
/// Runs of spaces or tabs count as one separator and blank lines are ignored;
/// any other line without exactly three fields is an error.
pub fn read_triplets(path: &Path) -> Result<Vec<Triplet>, Error>
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut triplets = Vec::new();
    for record in reader.records()
    {
        let record = record?;
        let fields: Vec<&str> = record.iter().flat_map(str::split_whitespace).collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 3 {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(Error::MalformedTriplet { path: path.to_path_buf(), line, fields: fields.len() });
        }
        let index = triplets.len();
        triplets.push(Triplet::new(index, fields[0], fields[1], fields[2]));
    }

    info!("Read {} triplets from {:?}", triplets.len(), path);
    Ok(triplets)
}

/// Swaps B and C on a randomly chosen half of the triplets, so that a classifier sees
/// both outcomes equally often. Returns one label per triplet: 1 if A is closer to B
/// (unchanged), 0 if the pair was swapped.
///
/// The choice is deterministic for a given seed. Indices are left untouched.
pub fn balance_triplets(triplets: &mut [Triplet], seed: u64) -> Vec<u8>
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut labels = vec![1u8; triplets.len()];
    for i in sample(&mut rng, triplets.len(), triplets.len() / 2)
    {
        let triplet = &mut triplets[i];
        std::mem::swap(&mut triplet.b, &mut triplet.c);
        labels[i] = 0;
    }
    labels
}
