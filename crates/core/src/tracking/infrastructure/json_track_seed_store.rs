use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::constants::{STATE_DIR_NAME, STATE_FILE_NAME};
use crate::tracking::domain::track_seed_store::{SeedStoreError, TrackSeedStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeedState {
    last_track_id: u32,
}

/// Stores the track-ID seed as `{"last_track_id": n}` in a JSON file.
pub struct JsonTrackSeedStore {
    path: PathBuf,
}

impl JsonTrackSeedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform config directory.
    pub fn in_config_dir() -> Result<Self, SeedStoreError> {
        let dir = dirs::config_dir().ok_or(SeedStoreError::NoConfigDir)?;
        Ok(Self::new(dir.join(STATE_DIR_NAME).join(STATE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SeedStoreError {
        SeedStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TrackSeedStore for JsonTrackSeedStore {
    fn load(&self) -> Result<u32, SeedStoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.io_error(e)),
        };
        let state: SeedState =
            serde_json::from_str(&text).map_err(|source| SeedStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        Ok(state.last_track_id)
    }

    fn save(&self, last_track_id: u32) -> Result<(), SeedStoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(SeedStoreError::StateDir)?;
        }
        let text = serde_json::to_string_pretty(&SeedState { last_track_id }).map_err(|source| {
            SeedStoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, text).map_err(|e| self.io_error(e))?;
        log::debug!("Saved last track id {last_track_id} to {}", self.path.display());
        Ok(())
    }
}
