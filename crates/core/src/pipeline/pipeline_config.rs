use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recognition::domain::recognition_job::AdmissionPolicy;
use crate::shared::constants::{DEFAULT_INITIAL_TRACK_ID, DEFAULT_WORKER_SLOTS};
use crate::tracking::domain::track_allocator::remaining_ids;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker_slots must be > 0 when recognition is enabled")]
    ZeroWorkerSlots,
    #[error("initial_track_id {0} leaves no room for new track IDs")]
    SeedExhausted(u32),
}

/// Tunables for a [`FacePipeline`](crate::pipeline::face_pipeline::FacePipeline).
///
/// Immutable once the pipeline is built. Missing JSON fields take the
/// defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Recognition queue capacity.
    pub worker_slots: usize,
    /// Track IDs are issued from `initial_track_id + 1`.
    pub initial_track_id: u32,
    /// Keep only the largest face per frame; liveness supports one subject.
    pub single_face: bool,
    pub recognition_enabled: bool,
    pub admission: AdmissionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_slots: DEFAULT_WORKER_SLOTS,
            initial_track_id: DEFAULT_INITIAL_TRACK_ID,
            single_face: true,
            recognition_enabled: true,
            admission: AdmissionPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// A seed is only rejected when no fresh ID at all is left after it;
    /// running out mid-session is reported per frame by the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recognition_enabled && self.worker_slots == 0 {
            return Err(ConfigError::ZeroWorkerSlots);
        }
        if remaining_ids(self.initial_track_id) == 0 {
            return Err(ConfigError::SeedExhausted(self.initial_track_id));
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: PipelineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
