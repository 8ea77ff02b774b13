mod config;
pub mod database;

pub use config::{Config, CuesConfig, DistanceConfig, GestureConfig, SessionConfig};
pub use database::Database;

use std::path::PathBuf;

use crate::error::{ConfigError, StoreError};
use crate::recording::Record;

/// Persistence collaborator for finished records.
///
/// The recording session only emits notices after these calls return `Ok`.
pub trait RecordStore {
    /// Commit a finished record and return its assigned id.
    fn insert(&mut self, record: &Record) -> Result<i64, StoreError>;

    /// Overwrite a persisted record. `record.id` must be set.
    fn update(&mut self, record: &Record) -> Result<(), StoreError>;

    fn remove(&mut self, id: i64) -> Result<(), StoreError>;

    /// Returns the number of deleted records.
    fn remove_by_activity(&mut self, activity_id: i64) -> Result<usize, StoreError>;

    /// Returns the number of deleted records.
    fn remove_by_category(&mut self, category_id: i64) -> Result<usize, StoreError>;

    /// Returns the number of deleted records.
    fn remove_all(&mut self) -> Result<usize, StoreError>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<Record>, StoreError>;
}

/// Returns the data directory, creating it if needed.
///
/// `ACTREC_DATA_DIR` wins if set. Otherwise `~/.config/actrec`, or
/// `~/.config/actrec-dev` with `ACTREC_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("ACTREC_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("ACTREC_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("actrec-dev")
            } else {
                base_dir.join("actrec")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
