// Moodscan command line
// Runs the batch pipeline, bootstraps the database or analyzes a single file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use moodscan_lib::audio::{analyze_file, AnalysisConfig, FeatureVector};
use moodscan_lib::config::DEFAULT_BATCH_SIZE;
use moodscan_lib::mood::{score_mood, MoodVector};
use moodscan_lib::state::{open_db, recreate_db};
use moodscan_lib::{run_pipeline, PipelineConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Extract audio features from the FMA corpus and score track moods")]
#[command(args_conflicts_with_subcommands = true)]
struct CliArgs {
    /// Path to the SQLite database file.
    #[arg(long, env = "MOODSCAN_DB", default_value = "music_mood.db", global = true)]
    db: PathBuf,

    /// Run options when no subcommand is given
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every track with audio on disk (default)
    Run(RunArgs),

    /// Create the database schema
    InitDb {
        /// Delete an existing database first
        #[arg(long)]
        force: bool,
    },

    /// Print features and mood for one audio file as JSON
    AnalyzeFile {
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Root of the FMA dataset, containing `fma_small/`.
    #[arg(long, env = "MOODSCAN_DATASET", default_value = "dataset")]
    dataset: PathBuf,

    /// Path to `tracks.csv`. Defaults to `<dataset>/fma_metadata/tracks.csv`.
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Directory for the per-run processing log.
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Tracks per committed batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

#[derive(Serialize)]
struct FileReport {
    path: PathBuf,
    features: FeatureVector,
    mood: MoodVector,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match cli_args.command {
        None => run(cli_args.db, cli_args.run),
        Some(Command::Run(args)) => run(cli_args.db, args),
        Some(Command::InitDb { force }) => init_db(cli_args.db, force),
        Some(Command::AnalyzeFile { path }) => analyze(path),
    }
}

fn run(db_path: PathBuf, args: RunArgs) -> Result<()> {
    if args.batch_size == 0 {
        anyhow::bail!("--batch-size must be at least 1");
    }

    let mut config = PipelineConfig::with_dataset_root(args.dataset);
    if let Some(metadata) = args.metadata {
        config.metadata_path = metadata;
    }
    config.db_path = db_path;
    config.log_dir = args.log_dir;
    config.batch_size = args.batch_size;

    println!("Starting FMA dataset processing...");
    let summary = run_pipeline(&config)
        .with_context(|| format!("Pipeline run against {:?} failed", config.db_path))?;

    log::info!(
        "Finished: {}/{} processed, {} errors",
        summary.processed,
        summary.total,
        summary.errors
    );
    Ok(())
}

fn init_db(db_path: PathBuf, force: bool) -> Result<()> {
    if force {
        recreate_db(&db_path)
    } else {
        open_db(&db_path)
    }
    .with_context(|| format!("Could not initialize database at {:?}", db_path))?;

    println!("Database initialized at {}", db_path.display());
    Ok(())
}

fn analyze(path: PathBuf) -> Result<()> {
    let features = analyze_file(&path, &AnalysisConfig::default())
        .with_context(|| format!("Could not analyze {:?}", path))?;
    let mood = score_mood(&features).context("Could not score mood")?;

    let report = FileReport {
        path,
        features,
        mood,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_run_options_without_subcommand() {
        let args =
            CliArgs::try_parse_from(["moodscan", "--dataset", "/data/fma", "--batch-size", "25"])
                .unwrap();

        assert!(args.command.is_none());
        assert_eq!(args.run.dataset, PathBuf::from("/data/fma"));
        assert_eq!(args.run.batch_size, 25);
    }

    #[test]
    fn test_run_subcommand_takes_same_options() {
        let args = CliArgs::try_parse_from(["moodscan", "run", "--batch-size", "7"]).unwrap();

        match args.command {
            Some(Command::Run(run)) => assert_eq!(run.batch_size, 7),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_options_conflict_with_other_subcommands() {
        assert!(CliArgs::try_parse_from(["moodscan", "--batch-size", "7", "init-db"]).is_err());
    }
}
