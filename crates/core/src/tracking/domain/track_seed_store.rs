use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedStoreError {
    #[error("failed to create state directory: {0}")]
    StateDir(#[source] std::io::Error),
    #[error("failed to access state file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed state file {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// Persists the last issued track ID so a new session continues numbering
/// after it instead of reissuing IDs from zero.
pub trait TrackSeedStore: Send {
    /// Returns the stored seed, or 0 when nothing has been saved yet.
    fn load(&self) -> Result<u32, SeedStoreError>;

    fn save(&self, last_track_id: u32) -> Result<(), SeedStoreError>;
}
