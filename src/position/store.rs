//! Persistence of the last known fix.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::PositionFix;
use crate::Result;

/// Directory under the user data dir holding the stored fix.
const STORE_DIR: &str = "geoclue-position";

/// File name of the stored fix.
const STORE_FILE: &str = "last-position.json";

/// Loads and saves one [`PositionFix`] at a fixed path.
///
/// Only the coordinate and the timestamp are written; accuracy, speed and
/// direction are not expected to survive a restore.
#[derive(Debug, Clone)]
pub struct LastFixStore {
    path: PathBuf,
}

impl LastFixStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user default location, if the platform has a data dir.
    pub fn at_default_location() -> Option<Self> {
        Self::default_path().map(Self::new)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(STORE_DIR).join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored fix. A missing or unreadable file yields `None`.
    pub fn load(&self) -> Option<PositionFix> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No stored position at {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<PositionFix>(&content) {
            Ok(fix) => Some(fix),
            Err(e) => {
                debug!("Ignoring stored position at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Atomically replace the stored fix. Invalid fixes are not written.
    ///
    /// Returns whether anything was written.
    pub fn save(&self, fix: &PositionFix) -> Result<bool> {
        if !fix.is_valid() {
            return Ok(false);
        }

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(&fix.to_persisted())?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&json)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!("Saved last position to {}", self.path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Coordinate;
    use chrono::DateTime;
    use tempfile::TempDir;

    fn sample_fix() -> PositionFix {
        let mut fix = PositionFix::new(
            Coordinate::new(59.437, 24.7536).with_altitude(31.5),
            DateTime::from_timestamp_millis(1_700_000_000_500).unwrap(),
        );
        fix.horizontal_accuracy = Some(20.0);
        fix.ground_speed = Some(1.5);
        fix.direction = Some(90.0);
        fix
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = LastFixStore::new(dir.path().join("nested").join("fix.json"));

        assert!(store.save(&sample_fix()).unwrap());
        let restored = store.load().unwrap();

        assert_eq!(restored.coordinate, sample_fix().coordinate);
        assert_eq!(restored.timestamp, sample_fix().timestamp);
        assert_eq!(restored.horizontal_accuracy, None);
        assert_eq!(restored.ground_speed, None);
        assert_eq!(restored.direction, None);
    }

    #[test]
    fn test_save_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let store = LastFixStore::new(dir.path().join("fix.json"));

        store.save(&sample_fix()).unwrap();
        let mut newer = sample_fix();
        newer.coordinate = Coordinate::new(-33.86, 151.21);
        store.save(&newer).unwrap();

        assert_eq!(store.load().unwrap().coordinate, Coordinate::new(-33.86, 151.21));
    }

    #[test]
    fn test_invalid_fix_not_written() {
        let dir = TempDir::new().unwrap();
        let store = LastFixStore::new(dir.path().join("fix.json"));

        let mut fix = sample_fix();
        fix.coordinate.latitude = 123.0;

        assert!(!store.save(&fix).unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = LastFixStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_file_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fix.json");
        fs::write(&path, b"\x00\x01 not json").unwrap();

        assert!(LastFixStore::new(path).load().is_none());
    }
}
