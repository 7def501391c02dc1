use thiserror::Error;

use crate::engine::domain::face_engine::{EngineError, FeatureVector};
use crate::tracking::domain::track_allocator::TrackIdsExhausted;

/// Non-fatal failures reported to the pipeline's owner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("face detection failed: {0}")]
    Detection(#[source] EngineError),
    #[error("liveness check failed: {0}")]
    Liveness(#[source] EngineError),
    #[error("feature extraction failed for track {track_id}: {source}")]
    Extraction {
        track_id: u32,
        #[source]
        source: EngineError,
    },
    #[error("liveness returned {liveness} results for {faces} faces")]
    LivenessMismatch { faces: usize, liveness: usize },
    #[error(transparent)]
    TrackIds(#[from] TrackIdsExhausted),
}

/// Callbacks from the pipeline to its owner.
///
/// `on_feature` runs on the recognition worker thread (or on the caller's
/// thread for an immediately rejected request); `on_fail` may run on either
/// thread. Implementations must not block for long.
pub trait PipelineListener: Send + Sync {
    /// Called exactly once per feature request. `None` means the request was
    /// rejected, cancelled, or failed.
    fn on_feature(&self, track_id: u32, feature: Option<FeatureVector>);

    fn on_fail(&self, error: &PipelineError);
}

/// Listener that ignores every event.
pub struct NullPipelineListener;

impl PipelineListener for NullPipelineListener {
    fn on_feature(&self, _track_id: u32, _feature: Option<FeatureVector>) {}
    fn on_fail(&self, _error: &PipelineError) {}
}
