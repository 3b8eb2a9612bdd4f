// Per-run processing log
// Append-only, timestamped text log; one file per run, never read back by the pipeline

use chrono::{DateTime, Local};
use log::Level;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while opening or closing the run log
#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// File name for a run started at `started_at`, e.g. `processing_log_20240131_235959.log`
pub fn log_file_name(started_at: &DateTime<Local>) -> String {
    format!("processing_log_{}.log", started_at.format("%Y%m%d_%H%M%S"))
}

/// Run log sink
///
/// Every line is also forwarded to the `log` facade, so console verbosity is
/// controlled by `RUST_LOG` while the file always receives INFO and above.
pub struct RunLog {
    file_path: Option<PathBuf>,
    writer: Option<Box<dyn Write>>,
}

impl RunLog {
    /// Create the log file for a run inside `dir`
    pub fn create(dir: &Path, started_at: DateTime<Local>) -> Result<Self, RunLogError> {
        fs::create_dir_all(dir)?;
        let file_path = dir.join(log_file_name(&started_at));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        Ok(RunLog {
            file_path: Some(file_path),
            writer: Some(Box::new(BufWriter::new(file))),
        })
    }

    /// Log to an arbitrary writer instead of a file
    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        RunLog {
            file_path: None,
            writer: Some(writer),
        }
    }

    /// Only forward to the `log` facade
    pub fn disabled() -> Self {
        RunLog {
            file_path: None,
            writer: None,
        }
    }

    /// Path of the log file, when logging to a file
    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.write_line(Level::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.write_line(Level::Warn, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.write_line(Level::Error, message.as_ref());
    }

    fn write_line(&mut self, level: Level, message: &str) {
        log::log!(level, "{}", message);

        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        if let Err(e) = writeln!(writer, "{} - {} - {}", timestamp, level, message) {
            // Keep the run going; the console still gets the message
            log::warn!("Run log write failed, disabling file log: {}", e);
            self.writer = None;
        }
    }

    /// Flush and close the log
    pub fn finish(mut self) -> Result<(), RunLogError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name_includes_start_time() {
        let started = Local.with_ymd_and_hms(2024, 1, 31, 23, 59, 58).unwrap();
        assert_eq!(log_file_name(&started), "processing_log_20240131_235958.log");
    }

    #[test]
    fn test_lines_are_timestamped_and_levelled() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = RunLog::create(temp_dir.path(), Local::now()).unwrap();
        let path = log.path().unwrap().to_path_buf();

        log.info("Loaded 3 tracks");
        log.error("Error processing track 7: boom");
        log.finish().unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - Loaded 3 tracks"));
        assert!(lines[1].ends_with(" - ERROR - Error processing track 7: boom"));

        // "YYYY-MM-DD HH:MM:SS,mmm" prefix
        let stamp = lines[0].split(" - ").next().unwrap();
        assert_eq!(stamp.len(), 23);
        assert_eq!(&stamp[19..20], ",");
    }

    #[test]
    fn test_log_appends_to_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let started = Local::now();

        let mut first = RunLog::create(temp_dir.path(), started).unwrap();
        first.info("first");
        let path = first.path().unwrap().to_path_buf();
        first.finish().unwrap();

        let mut second = RunLog::create(temp_dir.path(), started).unwrap();
        second.info("second");
        second.finish().unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_disabled_log_has_no_path() {
        let mut log = RunLog::disabled();
        log.warn("nowhere");
        assert!(log.path().is_none());
        log.finish().unwrap();
    }
}
