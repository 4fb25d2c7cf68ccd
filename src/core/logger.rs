/// Append-Only File Logger
///
/// Writes timestamped lines to a fixed file path in append mode. Two
/// severities suffice for this server: informational and error. A failed
/// log write is swallowed after one best-effort attempt — logging must
/// never be the reason the server crashes or blocks.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
        }
    }
}

/// A thin handle around the fixed log file path.
///
/// Cheap to clone (the path is the only state); every call opens the file
/// in append mode rather than holding it open, so the logger tolerates the
/// log file being rotated or deleted out from under it.
#[derive(Debug, Clone)]
pub struct Logger {
    path: std::path::PathBuf,
}

impl Logger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(Level::Info, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.write(Level::Error, message.as_ref());
    }

    fn write(&self, level: Level, message: &str) {
        let line = format_line(level, message);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            // Best effort: a failed write here must never propagate.
            let _ = file.write_all(line.as_bytes());
        }
    }
}

fn format_line(level: Level, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{timestamp}] [{}] {message}\n", level.label())
}
