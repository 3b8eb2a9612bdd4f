// Data models for persisted mood results
use serde::{Deserialize, Serialize};

use crate::catalog::ItemDescriptor;
use crate::mood::MoodVector;

/// Row of the `songs` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSong {
    pub track_id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub file_path: String,
}

impl From<&ItemDescriptor> for StoredSong {
    fn from(item: &ItemDescriptor) -> Self {
        StoredSong {
            track_id: item.id,
            title: item.title.clone(),
            artist: item.artist.clone(),
            album: item.album.clone(),
            file_path: item.source_path.to_string_lossy().to_string(),
        }
    }
}

/// Row of the `mood_analysis` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMoodAnalysis {
    pub id: i64,
    pub track_id: i64,
    pub mood: MoodVector,
}
