// SQLite database setup
// Opens the long-lived store connection and bootstraps the two-table schema
use rusqlite::{Connection, Transaction};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Single long-lived connection owned by the run.
/// Writes go through one transaction per batch.
pub struct DbConnection {
    conn: Connection,
}

impl DbConnection {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction; nothing written through it is durable until `commit`
    pub fn transaction(&mut self) -> DbResult<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

/// Open (or create) the mood database at `db_path`
pub fn open_db(db_path: &Path) -> DbResult<DbConnection> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path)?;
    configure_connection(&conn)?;
    create_schema(&conn)?;

    log::debug!("Opened mood database at {}", db_path.display());
    Ok(DbConnection::new(conn))
}

/// Delete any existing database at `db_path` and create a fresh one
pub fn recreate_db(db_path: &Path) -> DbResult<DbConnection> {
    if db_path.exists() {
        log::warn!("Removing existing database {}", db_path.display());
        std::fs::remove_file(db_path)?;
    }
    open_db(db_path)
}

/// In-memory database with the same schema, for tests and dry runs
pub fn open_in_memory() -> DbResult<DbConnection> {
    let conn = Connection::open_in_memory()?;
    configure_connection(&conn)?;
    create_schema(&conn)?;
    Ok(DbConnection::new(conn))
}

/// Per-connection settings. The bundled SQLite enforces foreign keys by
/// default; mood rows only reference songs logically, so enforcement is off.
fn configure_connection(conn: &Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", false)?;
    Ok(())
}

fn create_schema(conn: &Connection) -> DbResult<()> {
    // Songs table, one row per track (insert-or-replace by track_id)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS songs (
            track_id INTEGER PRIMARY KEY,
            title TEXT,
            artist TEXT,
            album TEXT,
            file_path TEXT
        )",
        [],
    )?;

    // Mood analyses are append-only; repeated runs add rows.
    // The foreign key is declarative only (see configure_connection).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS mood_analysis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            track_id INTEGER,
            happy_intensity REAL,
            sad_intensity REAL,
            energetic_intensity REAL,
            calm_intensity REAL,
            angry_intensity REAL,
            FOREIGN KEY (track_id) REFERENCES songs (track_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mood_analysis_track_id ON mood_analysis(track_id)",
        [],
    )?;

    Ok(())
}
