// Batch processor
// Drives catalog items through extraction, scoring and storage in fixed-size batches

use chrono::Local;
use rusqlite::Transaction;
use serde::Serialize;
use thiserror::Error;

use crate::audio::AudioError;
use crate::catalog::{load_tracks, ItemDescriptor};
use crate::config::PipelineConfig;
use crate::mood::{score_mood, MoodError, MoodVector};
use crate::pipeline::run_log::{RunLog, RunLogError};
use crate::pipeline::source::{AudioFeatureExtractor, FeatureSource};
use crate::state::{insert_mood_analysis, open_db, upsert_song, DbConnection, DbError, StoredSong};

/// How far an item got through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ItemStage {
    Pending,
    Extracted,
    Scored,
    Stored,
    Failed,
}

/// Failure of a single item; counted and logged, never fatal to the run
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("{0}")]
    Extraction(#[from] AudioError),

    #[error("{0}")]
    Scoring(#[from] MoodError),

    #[error("{0}")]
    Persistence(#[from] DbError),
}

impl ItemError {
    /// Last stage the item completed before failing
    pub fn stage(&self) -> ItemStage {
        match self {
            ItemError::Extraction(_) => ItemStage::Pending,
            ItemError::Scoring(_) => ItemStage::Extracted,
            ItemError::Persistence(_) => ItemStage::Scored,
        }
    }
}

/// Errors that abort the whole run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Run log error: {0}")]
    RunLog(#[from] RunLogError),
}

/// Totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
    pub batches: usize,
}

/// Run the whole pipeline with audio decoding as the feature source
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    let mut source = AudioFeatureExtractor::new(config.analysis.clone());
    run_pipeline_with(config, &mut source)
}

/// Run the whole pipeline: open the run log and store, load the catalog,
/// process every item, then close the log
pub fn run_pipeline_with<S: FeatureSource>(
    config: &PipelineConfig,
    source: &mut S,
) -> Result<RunSummary, PipelineError> {
    if config.batch_size == 0 {
        return Err(PipelineError::InvalidBatchSize);
    }

    let mut log = RunLog::create(&config.log_dir, Local::now())?;
    if let Some(path) = log.path() {
        log::info!("Writing run log to {}", path.display());
    }

    let mut db = open_db(&config.db_path)?;

    println!("Loading tracks metadata...");
    let items = load_tracks(&config.catalog_source(), &mut log);

    let summary = process_and_store(&items, source, &mut db, &mut log, config.batch_size)?;

    log.finish()?;
    Ok(summary)
}

/// Process `items` in batches of `batch_size`, committing once per batch.
///
/// Item failures are counted and logged; only store-level failures to begin or
/// commit a batch abort the run.
pub fn process_and_store<S: FeatureSource + ?Sized>(
    items: &[ItemDescriptor],
    source: &mut S,
    db: &mut DbConnection,
    log: &mut RunLog,
    batch_size: usize,
) -> Result<RunSummary, PipelineError> {
    if batch_size == 0 {
        return Err(PipelineError::InvalidBatchSize);
    }

    let mut summary = RunSummary {
        total: items.len(),
        ..RunSummary::default()
    };

    if items.is_empty() {
        println!("No tracks found!");
        return Ok(summary);
    }

    let batch_count = items.len().div_ceil(batch_size);
    println!("\nProcessing {} tracks...", summary.total);

    for (batch_index, batch) in items.chunks(batch_size).enumerate() {
        println!("\nProcessing batch {}/{}", batch_index + 1, batch_count);

        let mut tx = db.transaction()?;

        for item in batch {
            let stage = match process_item(&mut tx, source, item) {
                Ok(_) => {
                    summary.processed += 1;
                    ItemStage::Stored
                }
                Err(e) => {
                    summary.errors += 1;
                    log::debug!("Track {} failed after stage {:?}", item.id, e.stage());
                    log.error(format!("Error processing track {}: {}", item.id, e));
                    ItemStage::Failed
                }
            };
            log::trace!("Track {} -> {:?}", item.id, stage);
        }

        tx.commit().map_err(DbError::from)?;
        summary.batches += 1;

        println!(
            "Progress: {}/{} tracks processed, {} errors",
            summary.processed, summary.total, summary.errors
        );
    }

    println!("\nProcessing complete!");
    println!("Successfully processed: {} tracks", summary.processed);
    println!("Errors: {} tracks", summary.errors);
    println!("Check the log file for details about any errors.");

    log.info(format!(
        "Run complete: {} processed, {} errors, {} batches",
        summary.processed, summary.errors, summary.batches
    ));

    Ok(summary)
}

/// Extract, score and store one item
fn process_item<S: FeatureSource + ?Sized>(
    tx: &mut Transaction<'_>,
    source: &mut S,
    item: &ItemDescriptor,
) -> Result<MoodVector, ItemError> {
    let features = source.extract(item)?;
    let mood = score_mood(&features)?;
    store_item(tx, item, &mood)?;
    Ok(mood)
}

/// Write the song and its mood row; a failure leaves neither behind
fn store_item(
    tx: &mut Transaction<'_>,
    item: &ItemDescriptor,
    mood: &MoodVector,
) -> Result<(), DbError> {
    let sp = tx.savepoint()?;
    upsert_song(&sp, &StoredSong::from(item))?;
    insert_mood_analysis(&sp, item.id, mood)?;
    sp.commit()?;
    Ok(())
}
