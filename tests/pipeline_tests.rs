// End-to-end pipeline tests
// Catalog on disk -> batch processing -> SQLite, with a scripted feature source

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use moodscan_lib::audio::{analyze_file, AnalysisConfig, AudioError, FeatureVector, N_MFCC};
use moodscan_lib::catalog::{track_audio_path, ItemDescriptor};
use moodscan_lib::mood::score_mood;
use moodscan_lib::pipeline::{run_pipeline_with, FeatureSource, PipelineError};
use moodscan_lib::state::{count_mood_analyses, count_songs, get_song, list_mood_analyses_for_track, open_db};
use moodscan_lib::{run_pipeline, PipelineConfig};

const TRACKS_CSV: &str = "\
,album,artist,track
,title,name,title
track_id,,,
2,AWOL - A Way Of Life,AWOL,Food
3,AWOL - A Way Of Life,AWOL,Electric Ave
5,,AWOL,This World
10,Constant Hitmaker,Kurt Vile,Freeway
";

/// Fixed features per track; track 5 has an undefined tempo
struct ScriptedSource;

impl FeatureSource for ScriptedSource {
    fn extract(&mut self, item: &ItemDescriptor) -> Result<FeatureVector, AudioError> {
        let tempo = if item.id == 5 { f64::NAN } else { 180.0 };
        Ok(FeatureVector {
            tempo,
            spectral_centroid: 2000.0,
            spectral_bandwidth: 1800.0,
            rms_energy: 0.05,
            zero_crossing_rate: 0.1,
            chroma_mean: 0.5,
            mfcc: [0.0; N_MFCC],
        })
    }
}

fn dataset(dir: &Path, present: &[i64]) -> PipelineConfig {
    let mut config = PipelineConfig::with_dataset_root(dir.join("dataset"));
    fs::create_dir_all(config.metadata_path.parent().unwrap()).unwrap();
    fs::write(&config.metadata_path, TRACKS_CSV).unwrap();

    for &id in present {
        let path = track_audio_path(&config.dataset_root, id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"placeholder").unwrap();
    }

    config.db_path = dir.join("out").join("music_mood.db");
    config.log_dir = dir.join("logs");
    config.batch_size = 2;
    config
}

fn read_run_log(config: &PipelineConfig) -> String {
    let entry = fs::read_dir(&config.log_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("processing_log_") && n.ends_with(".log"))
        })
        .expect("run log file");
    fs::read_to_string(entry).unwrap()
}

#[test]
fn test_run_stores_every_scorable_track() {
    let temp_dir = TempDir::new().unwrap();
    // Track 3 has no audio file and is never seen by the pipeline
    let config = dataset(temp_dir.path(), &[2, 5, 10]);

    let summary = run_pipeline_with(&config, &mut ScriptedSource).unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.batches, 2);

    let db = open_db(&config.db_path).unwrap();
    assert_eq!(count_songs(db.connection()).unwrap(), 2);
    assert_eq!(count_mood_analyses(db.connection()).unwrap(), 2);

    let song = get_song(db.connection(), 10).unwrap().unwrap();
    assert_eq!(song.title, "Freeway");
    assert_eq!(song.artist, "Kurt Vile");

    let moods = list_mood_analyses_for_track(db.connection(), 2).unwrap();
    assert_eq!(moods.len(), 1);
    assert!((moods[0].mood.energetic - 0.75).abs() < 1e-9);
    assert!((moods[0].mood.happy - 0.75).abs() < 1e-9);
    assert!((moods[0].mood.angry - 0.05).abs() < 1e-9);

    let log = read_run_log(&config);
    assert!(log.contains("Found 3 valid tracks with audio files"));
    assert!(log.contains("Error processing track 5:"));
}

#[test]
fn test_second_run_appends_mood_rows() {
    let temp_dir = TempDir::new().unwrap();
    let config = dataset(temp_dir.path(), &[2, 10]);

    run_pipeline_with(&config, &mut ScriptedSource).unwrap();
    run_pipeline_with(&config, &mut ScriptedSource).unwrap();

    let db = open_db(&config.db_path).unwrap();
    assert_eq!(count_songs(db.connection()).unwrap(), 2);
    assert_eq!(count_mood_analyses(db.connection()).unwrap(), 4);
}

#[test]
fn test_missing_metadata_means_no_tracks() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = PipelineConfig::with_dataset_root(temp_dir.path().join("nowhere"));
    config.db_path = temp_dir.path().join("music_mood.db");
    config.log_dir = temp_dir.path().to_path_buf();

    let summary = run_pipeline(&config).unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.batches, 0);
    assert!(read_run_log(&config).contains(" - ERROR - Error loading metadata:"));

    // Schema was still created
    let db = open_db(&config.db_path).unwrap();
    assert_eq!(count_songs(db.connection()).unwrap(), 0);
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = dataset(temp_dir.path(), &[2]);
    config.batch_size = 0;

    let result = run_pipeline_with(&config, &mut ScriptedSource);
    assert!(matches!(result, Err(PipelineError::InvalidBatchSize)));
}

#[test]
fn test_placeholder_audio_fails_real_extraction() {
    let temp_dir = TempDir::new().unwrap();
    let config = dataset(temp_dir.path(), &[2, 3]);

    // The audio files are not decodable, so every track is an item error
    let summary = run_pipeline(&config).unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.errors, 2);
    assert_eq!(summary.batches, 1);
}

#[test]
fn test_analyze_wav_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tone.wav");

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..44100 {
        let t = i as f32 / 44100.0;
        let s = (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 32767.0) as i16;
        writer.write_sample(s).unwrap();
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    let features = analyze_file(&path, &AnalysisConfig::default()).unwrap();

    assert!(features.first_non_finite().is_none());
    assert!(features.spectral_centroid > 300.0 && features.spectral_centroid < 700.0);
    assert!(features.rms_energy > 0.15 && features.rms_energy < 0.25);

    let mood = score_mood(&features).unwrap();
    assert!((mood.calm - (1.0 - mood.energetic)).abs() < 1e-12);
    assert!((mood.sad - (1.0 - mood.happy)).abs() < 1e-12);
}
