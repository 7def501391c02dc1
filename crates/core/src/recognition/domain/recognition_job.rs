use serde::{Deserialize, Serialize};

use crate::engine::domain::face_engine::DetectedFace;
use crate::shared::frame::Frame;

/// A pending feature-extraction request.
///
/// Owns its frame copy so the camera buffer can be reused as soon as
/// the request is submitted.
#[derive(Clone, Debug)]
pub struct RecognitionJob {
    pub track_id: u32,
    pub frame: Frame,
    pub face: DetectedFace,
}

impl RecognitionJob {
    pub fn new(track_id: u32, frame: &Frame, face: &DetectedFace) -> Self {
        Self {
            track_id,
            frame: frame.clone(),
            face: face.clone(),
        }
    }
}

/// When the dispatcher accepts new jobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Only accept while no extraction is running.
    #[default]
    RejectWhileBusy,
    /// Queue behind a running extraction until the queue is full.
    QueueWhileBusy,
}

/// Why a job was not admitted. Rejection is normal backpressure, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    NoWorker,
    Released,
    Busy,
    QueueFull,
}
