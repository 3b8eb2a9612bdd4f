// Catalog loading
// Reads the two-level-header FMA tracks table and keeps the tracks whose audio is on disk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pipeline::RunLog;

/// Subset directory under the dataset root holding the audio shards
pub const SUBSET_DIR: &str = "fma_small";

/// Extension of every audio file in the corpus
pub const AUDIO_EXTENSION: &str = "mp3";

const TITLE_COLUMN: (&str, &str) = ("track", "title");
const ARTIST_COLUMN: (&str, &str) = ("artist", "name");
const ALBUM_COLUMN: (&str, &str) = ("album", "title");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read metadata table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Metadata table is missing its two header rows")]
    MissingHeader,

    #[error("Metadata table has no ({0}, {1}) column")]
    MissingColumn(&'static str, &'static str),
}

/// One track that has both a metadata row and an audio file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// FMA track id (row index of the metadata table)
    pub id: i64,

    pub title: String,
    pub artist: String,
    pub album: String,

    /// Resolved path of the raw audio file
    pub source_path: PathBuf,
}

/// Where the catalog lives on disk
#[derive(Debug, Clone)]
pub struct CatalogSource {
    /// Path of `tracks.csv`
    pub metadata_path: PathBuf,

    /// Root containing the `fma_small/` shard directories
    pub dataset_root: PathBuf,
}

/// Build the audio path for a track id.
///
/// The id is zero-padded to six digits; the first three digits name the shard
/// directory, e.g. `42` -> `<root>/fma_small/000/000042.mp3`.
pub fn track_audio_path(dataset_root: &Path, track_id: i64) -> PathBuf {
    let tid = format!("{:06}", track_id);
    let shard = tid.get(..3).unwrap_or(&tid);
    dataset_root
        .join(SUBSET_DIR)
        .join(shard)
        .join(format!("{}.{}", tid, AUDIO_EXTENSION))
}

/// Load every track whose audio file exists.
///
/// A metadata table that cannot be read is logged and yields an empty list,
/// which callers treat as "nothing to do".
pub fn load_tracks(source: &CatalogSource, log: &mut RunLog) -> Vec<ItemDescriptor> {
    match read_catalog(source, log) {
        Ok(items) => {
            log.info(format!("Found {} valid tracks with audio files", items.len()));
            items
        }
        Err(e) => {
            log.error(format!("Error loading metadata: {}", e));
            Vec::new()
        }
    }
}

/// Read the metadata table and filter it down to tracks present on disk.
/// Output order follows the row order of the table.
pub fn read_catalog(
    source: &CatalogSource,
    log: &mut RunLog,
) -> Result<Vec<ItemDescriptor>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&source.metadata_path)?;

    let mut records = reader.records();
    let top = records.next().ok_or(CatalogError::MissingHeader)??;
    let sub = records.next().ok_or(CatalogError::MissingHeader)??;
    let columns = ColumnIndex::new(&top, &sub)?;

    let mut row_count = 0usize;
    let mut items = Vec::new();

    for record in records {
        let record = record?;

        // Rows without a numeric id (the index-name row) carry no track
        let track_id = match record.get(0).and_then(|s| s.trim().parse::<i64>().ok()) {
            Some(id) => id,
            None => continue,
        };
        row_count += 1;

        let source_path = track_audio_path(&source.dataset_root, track_id);
        if !source_path.exists() {
            continue;
        }

        items.push(ItemDescriptor {
            id: track_id,
            title: cell(&record, columns.title),
            artist: cell(&record, columns.artist),
            album: cell(&record, columns.album),
            source_path,
        });
    }

    log.info(format!(
        "Successfully loaded tracks metadata. Total tracks: {}",
        row_count
    ));

    Ok(items)
}

/// Positions of the metadata columns we read, resolved from the header rows
struct ColumnIndex {
    title: usize,
    artist: usize,
    album: usize,
}

impl ColumnIndex {
    fn new(top: &csv::StringRecord, sub: &csv::StringRecord) -> Result<Self, CatalogError> {
        Ok(ColumnIndex {
            title: find_column(top, sub, TITLE_COLUMN)?,
            artist: find_column(top, sub, ARTIST_COLUMN)?,
            album: find_column(top, sub, ALBUM_COLUMN)?,
        })
    }
}

fn find_column(
    top: &csv::StringRecord,
    sub: &csv::StringRecord,
    (top_name, sub_name): (&'static str, &'static str),
) -> Result<usize, CatalogError> {
    // Column 0 is the track id index
    (1..top.len())
        .find(|&i| {
            top.get(i).map(str::trim) == Some(top_name)
                && sub.get(i).map(str::trim) == Some(sub_name)
        })
        .ok_or(CatalogError::MissingColumn(top_name, sub_name))
}

fn cell(record: &csv::StringRecord, index: usize) -> String {
    record.get(index).unwrap_or_default().to_string()
}
