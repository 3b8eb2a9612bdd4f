// State management module
// Handles SQLite persistence of songs and mood analyses

pub mod db;
pub mod models;
pub mod queries;

pub use db::{open_db, open_in_memory, recreate_db, DbConnection, DbError, DbResult};
pub use models::{StoredMoodAnalysis, StoredSong};
pub use queries::{
    count_mood_analyses, count_songs, get_song, insert_mood_analysis,
    list_mood_analyses_for_track, upsert_song,
};
