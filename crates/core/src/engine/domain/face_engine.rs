use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// One face found by the engine in the current frame.
///
/// Detections carry no identity of their own; track IDs are assigned by
/// the tracking layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub rect: Rect,
    /// Engine-specific face orientation code.
    #[serde(default)]
    pub orientation: i32,
    /// Engine-internal face id; unrelated to track IDs.
    #[serde(default)]
    pub face_id: i32,
}

impl DetectedFace {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            orientation: 0,
            face_id: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Alive,
    NotAlive,
    #[default]
    Unknown,
}

/// Opaque feature bytes produced by the engine for one face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureVector(pub Vec<u8>);

impl FeatureVector {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{operation} failed, code is {code}")]
    Status { operation: &'static str, code: i32 },
    #[error("{0}")]
    Other(String),
}

/// Face detection, liveness and feature extraction capability.
///
/// A single engine instance is shared between the frame path and the
/// recognition worker. `detect_faces` and `liveness` are only called from
/// the frame path; `extract_feature` is only called from the recognition
/// worker, one call at a time.
pub trait FaceEngine: Send + Sync {
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<DetectedFace>, EngineError>;

    /// Returns one result per face, in the order of `faces`.
    fn liveness(&self, frame: &Frame, faces: &[DetectedFace]) -> Result<Vec<Liveness>, EngineError>;

    fn extract_feature(
        &self,
        frame: &Frame,
        face: &DetectedFace,
    ) -> Result<FeatureVector, EngineError>;
}
