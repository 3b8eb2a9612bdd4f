// Database read/write operations
use rusqlite::{params, Connection, OptionalExtension};

use super::db::DbResult;
use super::models::{StoredMoodAnalysis, StoredSong};
use crate::mood::MoodVector;

// ==================== SONG QUERIES ====================

/// Insert a song, replacing any existing row with the same track id
pub fn upsert_song(conn: &Connection, song: &StoredSong) -> DbResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO songs (track_id, title, artist, album, file_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            song.track_id,
            song.title,
            song.artist,
            song.album,
            song.file_path,
        ],
    )?;
    Ok(())
}

/// Get a song by track id
pub fn get_song(conn: &Connection, track_id: i64) -> DbResult<Option<StoredSong>> {
    let song = conn
        .query_row(
            "SELECT track_id, title, artist, album, file_path FROM songs WHERE track_id = ?1",
            [track_id],
            |row| {
                Ok(StoredSong {
                    track_id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    artist: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    album: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    file_path: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            },
        )
        .optional()?;

    Ok(song)
}

pub fn count_songs(conn: &Connection) -> DbResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?)
}

// ==================== MOOD ANALYSIS QUERIES ====================

/// Append a mood analysis row and return its id
pub fn insert_mood_analysis(conn: &Connection, track_id: i64, mood: &MoodVector) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO mood_analysis
         (track_id, happy_intensity, sad_intensity, energetic_intensity, calm_intensity, angry_intensity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            track_id,
            mood.happy,
            mood.sad,
            mood.energetic,
            mood.calm,
            mood.angry,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All analyses for a track, oldest first
pub fn list_mood_analyses_for_track(
    conn: &Connection,
    track_id: i64,
) -> DbResult<Vec<StoredMoodAnalysis>> {
    let mut stmt = conn.prepare(
        "SELECT id, track_id, happy_intensity, sad_intensity, energetic_intensity, calm_intensity, angry_intensity
         FROM mood_analysis WHERE track_id = ?1
         ORDER BY id ASC",
    )?;

    let analyses = stmt
        .query_map([track_id], |row| {
            Ok(StoredMoodAnalysis {
                id: row.get(0)?,
                track_id: row.get(1)?,
                mood: MoodVector {
                    happy: row.get(2)?,
                    sad: row.get(3)?,
                    energetic: row.get(4)?,
                    calm: row.get(5)?,
                    angry: row.get(6)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(analyses)
}

pub fn count_mood_analyses(conn: &Connection) -> DbResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM mood_analysis", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::db::open_in_memory;

    fn song(track_id: i64, title: &str) -> StoredSong {
        StoredSong {
            track_id,
            title: title.to_string(),
            artist: "AWOL".to_string(),
            album: "AWOL - A Way Of Life".to_string(),
            file_path: format!("dataset/fma_small/000/{:06}.mp3", track_id),
        }
    }

    fn mood(happy: f64, energetic: f64) -> MoodVector {
        MoodVector {
            happy,
            sad: 1.0 - happy,
            energetic,
            calm: 1.0 - energetic,
            angry: 0.1,
        }
    }

    #[test]
    fn test_upsert_keeps_one_row_with_latest_values() {
        let db = open_in_memory().unwrap();
        let conn = db.connection();

        upsert_song(conn, &song(2, "Food")).unwrap();
        upsert_song(conn, &song(2, "Food (Remastered)")).unwrap();

        assert_eq!(count_songs(conn).unwrap(), 1);
        let stored = get_song(conn, 2).unwrap().unwrap();
        assert_eq!(stored.title, "Food (Remastered)");
    }

    #[test]
    fn test_mood_analysis_is_append_only() {
        let db = open_in_memory().unwrap();
        let conn = db.connection();

        let first = insert_mood_analysis(conn, 2, &mood(0.75, 0.75)).unwrap();
        let second = insert_mood_analysis(conn, 2, &mood(0.5, 0.25)).unwrap();

        assert!(second > first);
        let analyses = list_mood_analyses_for_track(conn, 2).unwrap();
        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].mood, mood(0.75, 0.75));
        assert_eq!(analyses[1].mood, mood(0.5, 0.25));
    }

    #[test]
    fn test_mood_analysis_does_not_require_song_row() {
        let db = open_in_memory().unwrap();
        let conn = db.connection();

        insert_mood_analysis(conn, 99, &mood(0.2, 0.3)).unwrap();

        assert_eq!(count_mood_analyses(conn).unwrap(), 1);
        assert!(get_song(conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_negative_intensities_round_trip() {
        let db = open_in_memory().unwrap();
        let conn = db.connection();
        let unclamped = MoodVector {
            happy: -0.25,
            sad: 1.25,
            energetic: -0.1,
            calm: 1.1,
            angry: -0.5,
        };

        insert_mood_analysis(conn, 7, &unclamped).unwrap();

        let stored = list_mood_analyses_for_track(conn, 7).unwrap();
        assert_eq!(stored[0].mood, unclamped);
    }
}
