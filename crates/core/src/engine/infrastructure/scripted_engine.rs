//! Deterministic engine that replays detections from a JSON script.
//!
//! Each script entry describes one frame (looked up by frame index): the
//! faces to report, their liveness, and optional failure codes. Features
//! come from the script when given, otherwise from a luminance histogram
//! of the face crop, so identical crops always produce identical features.
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::domain::face_engine::{
    DetectedFace, EngineError, FaceEngine, FeatureVector, Liveness,
};
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

const HISTOGRAM_BINS: usize = 16;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EngineScript {
    #[serde(default)]
    pub frames: Vec<ScriptedFrame>,
    /// Simulated extraction latency.
    #[serde(default)]
    pub extract_delay_ms: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScriptedFrame {
    #[serde(default)]
    pub faces: Vec<ScriptedFace>,
    #[serde(default)]
    pub detect_error: Option<i32>,
    #[serde(default)]
    pub liveness_error: Option<i32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScriptedFace {
    pub rect: Rect,
    #[serde(default)]
    pub orientation: i32,
    #[serde(default)]
    pub liveness: Liveness,
    #[serde(default)]
    pub feature: Option<Vec<u8>>,
    #[serde(default)]
    pub extract_error: Option<i32>,
}

impl ScriptedFace {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            orientation: 0,
            liveness: Liveness::Alive,
            feature: None,
            extract_error: None,
        }
    }

    fn detected(&self, face_id: i32) -> DetectedFace {
        DetectedFace {
            rect: self.rect,
            orientation: self.orientation,
            face_id,
        }
    }
}

pub struct ScriptedEngine {
    frames: HashMap<usize, ScriptedFrame>,
    extract_delay: Duration,
    extract_calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(script: EngineScript) -> Self {
        Self {
            frames: script.frames.into_iter().enumerate().collect(),
            extract_delay: Duration::from_millis(script.extract_delay_ms),
            extract_calls: AtomicUsize::new(0),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        let script: EngineScript = serde_json::from_str(&text)?;
        Ok(Self::new(script))
    }

    /// Number of scripted frames; frames past the end report no faces.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// How many times `extract_feature` has been entered.
    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    fn scripted_face(&self, frame: &Frame, face: &DetectedFace) -> Option<&ScriptedFace> {
        self.frames
            .get(&frame.index())?
            .faces
            .iter()
            .find(|f| f.rect == face.rect)
    }
}

impl FaceEngine for ScriptedEngine {
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<DetectedFace>, EngineError> {
        let Some(scripted) = self.frames.get(&frame.index()) else {
            return Ok(Vec::new());
        };
        if let Some(code) = scripted.detect_error {
            return Err(EngineError::Status {
                operation: "detect",
                code,
            });
        }
        Ok(scripted
            .faces
            .iter()
            .enumerate()
            .map(|(i, f)| f.detected(i as i32))
            .collect())
    }

    fn liveness(&self, frame: &Frame, faces: &[DetectedFace]) -> Result<Vec<Liveness>, EngineError> {
        let scripted = self.frames.get(&frame.index());
        if let Some(code) = scripted.and_then(|s| s.liveness_error) {
            return Err(EngineError::Status {
                operation: "liveness",
                code,
            });
        }
        Ok(faces
            .iter()
            .map(|face| {
                self.scripted_face(frame, face)
                    .map_or(Liveness::Unknown, |f| f.liveness)
            })
            .collect())
    }

    fn extract_feature(
        &self,
        frame: &Frame,
        face: &DetectedFace,
    ) -> Result<FeatureVector, EngineError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if !self.extract_delay.is_zero() {
            std::thread::sleep(self.extract_delay);
        }

        let scripted = self.scripted_face(frame, face);
        if let Some(code) = scripted.and_then(|f| f.extract_error) {
            return Err(EngineError::Status {
                operation: "extract",
                code,
            });
        }
        if let Some(bytes) = scripted.and_then(|f| f.feature.clone()) {
            return Ok(FeatureVector(bytes));
        }
        luminance_histogram(frame, &face.rect)
    }
}

/// 16-bin luminance histogram of the face crop, scaled to 0..=255.
fn luminance_histogram(frame: &Frame, rect: &Rect) -> Result<FeatureVector, EngineError> {
    let crop = rect.clamp_to(frame.width(), frame.height());
    if crop.area() <= 0 {
        return Err(EngineError::Other(format!(
            "face {rect:?} lies outside the {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let luma = frame
        .luma()
        .map_err(|e| EngineError::Other(format!("unreadable frame {}: {e}", frame.index())))?;
    let mut hist = [0u64; HISTOGRAM_BINS];
    for y in crop.top as usize..crop.bottom as usize {
        for x in crop.left as usize..crop.right as usize {
            hist[luma[[y, x]] as usize * HISTOGRAM_BINS / 256] += 1;
        }
    }

    let total = crop.area() as u64;
    Ok(FeatureVector(
        hist.iter().map(|&n| (n * 255 / total) as u8).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;

    fn script(frames: Vec<ScriptedFrame>) -> EngineScript {
        EngineScript {
            frames,
            extract_delay_ms: 0,
        }
    }

    fn one_face_frame(rect: Rect) -> ScriptedFrame {
        ScriptedFrame {
            faces: vec![ScriptedFace::new(rect)],
            ..Default::default()
        }
    }

    fn gray(index: usize, value: u8) -> Frame {
        Frame::new(vec![value; 20 * 20], 20, 20, PixelFormat::Gray8, index)
    }

    #[test]
    fn test_detects_scripted_faces_by_frame_index() {
        let engine = ScriptedEngine::new(script(vec![
            ScriptedFrame::default(),
            one_face_frame(Rect::new(0, 0, 10, 10)),
        ]));

        assert!(engine.detect_faces(&gray(0, 0)).unwrap().is_empty());
        let faces = engine.detect_faces(&gray(1, 0)).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].rect, Rect::new(0, 0, 10, 10));
    }

    #[test]
    fn test_frames_past_script_have_no_faces() {
        let engine = ScriptedEngine::new(script(vec![one_face_frame(Rect::new(0, 0, 5, 5))]));
        assert!(engine.detect_faces(&gray(7, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_detect_error_code() {
        let engine = ScriptedEngine::new(script(vec![ScriptedFrame {
            detect_error: Some(2),
            ..Default::default()
        }]));
        let err = engine.detect_faces(&gray(0, 0)).unwrap_err();
        assert_eq!(
            err,
            EngineError::Status {
                operation: "detect",
                code: 2
            }
        );
    }

    #[test]
    fn test_liveness_follows_face_order() {
        let mut frame = ScriptedFrame::default();
        frame.faces.push(ScriptedFace::new(Rect::new(0, 0, 5, 5)));
        frame.faces.push(ScriptedFace {
            liveness: Liveness::NotAlive,
            ..ScriptedFace::new(Rect::new(10, 10, 15, 15))
        });
        let engine = ScriptedEngine::new(script(vec![frame]));

        let faces = engine.detect_faces(&gray(0, 0)).unwrap();
        let liveness = engine.liveness(&gray(0, 0), &faces).unwrap();
        assert_eq!(liveness, vec![Liveness::Alive, Liveness::NotAlive]);
    }

    #[test]
    fn test_liveness_unknown_for_unscripted_face() {
        let engine = ScriptedEngine::new(script(vec![ScriptedFrame::default()]));
        let faces = vec![DetectedFace::new(Rect::new(0, 0, 5, 5))];
        let liveness = engine.liveness(&gray(0, 0), &faces).unwrap();
        assert_eq!(liveness, vec![Liveness::Unknown]);
    }

    #[test]
    fn test_extract_uses_scripted_feature() {
        let engine = ScriptedEngine::new(script(vec![ScriptedFrame {
            faces: vec![ScriptedFace {
                feature: Some(vec![1, 2, 3]),
                ..ScriptedFace::new(Rect::new(0, 0, 10, 10))
            }],
            ..Default::default()
        }]));
        let face = DetectedFace::new(Rect::new(0, 0, 10, 10));

        let feature = engine.extract_feature(&gray(0, 0), &face).unwrap();
        assert_eq!(feature.as_bytes(), &[1, 2, 3]);
        assert_eq!(engine.extract_calls(), 1);
    }

    #[test]
    fn test_extract_histogram_of_uniform_crop() {
        let engine = ScriptedEngine::new(script(vec![]));
        let face = DetectedFace::new(Rect::new(0, 0, 10, 10));

        let feature = engine.extract_feature(&gray(0, 255), &face).unwrap();
        assert_eq!(feature.as_bytes().len(), HISTOGRAM_BINS);
        assert_eq!(feature.as_bytes()[HISTOGRAM_BINS - 1], 255);
        assert_eq!(feature.as_bytes()[0], 0);
    }

    #[test]
    fn test_extract_error_for_face_outside_frame() {
        let engine = ScriptedEngine::new(script(vec![]));
        let face = DetectedFace::new(Rect::new(50, 50, 60, 60));
        assert!(engine.extract_feature(&gray(0, 0), &face).is_err());
    }

    #[test]
    fn test_script_parses_from_json() {
        let json = r#"{
            "extract_delay_ms": 5,
            "frames": [
                {"faces": [{"rect": [0, 0, 10, 10], "liveness": "alive"}]},
                {"detect_error": 7}
            ]
        }"#;
        let script: EngineScript = serde_json::from_str(json).unwrap();
        assert_eq!(script.frames.len(), 2);
        assert_eq!(script.extract_delay_ms, 5);
        assert_eq!(script.frames[1].detect_error, Some(7));
    }
}
