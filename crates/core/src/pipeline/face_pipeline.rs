use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::engine::domain::face_engine::{DetectedFace, FaceEngine, Liveness};
use crate::pipeline::face_filter::keep_largest_face;
use crate::pipeline::pipeline_config::{ConfigError, PipelineConfig};
use crate::pipeline::pipeline_listener::{PipelineError, PipelineListener};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::recognition::domain::recognition_job::RecognitionJob;
use crate::recognition::infrastructure::recognition_dispatcher::RecognitionDispatcher;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;
use crate::tracking::domain::name_bindings::NameBindings;
use crate::tracking::domain::track_allocator::{TrackAllocator, TrackedFace};

#[derive(Error, Debug)]
pub enum PipelineBuildError {
    #[error("invalid pipeline config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to start recognition worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// One visible face in the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FacePreview {
    pub face: DetectedFace,
    pub liveness: Liveness,
    pub track_id: u32,
}

/// Per-frame entry point: detect → track → liveness, plus the handle for
/// asynchronous feature requests.
///
/// `process_frame` runs on the caller's thread and never waits on feature
/// extraction, which happens on the dispatcher's worker.
pub struct FacePipeline {
    engine: Arc<dyn FaceEngine>,
    listener: Arc<dyn PipelineListener>,
    config: PipelineConfig,
    allocator: TrackAllocator,
    names: Arc<NameBindings>,
    dispatcher: RecognitionDispatcher,
    logger: Box<dyn PipelineLogger>,
}

impl FacePipeline {
    pub fn new(
        engine: Arc<dyn FaceEngine>,
        listener: Arc<dyn PipelineListener>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineBuildError> {
        Self::with_names(engine, listener, Arc::new(NameBindings::new()), config)
    }

    /// Builds a pipeline around an existing name store, typically one the
    /// listener also holds so it can bind names as features arrive.
    pub fn with_names(
        engine: Arc<dyn FaceEngine>,
        listener: Arc<dyn PipelineListener>,
        names: Arc<NameBindings>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineBuildError> {
        config.validate()?;

        let dispatcher = if config.recognition_enabled {
            RecognitionDispatcher::new(
                Arc::clone(&engine),
                Arc::clone(&listener),
                config.worker_slots,
                config.admission,
            )?
        } else {
            RecognitionDispatcher::disabled(Arc::clone(&listener))
        };

        Ok(Self {
            engine,
            listener,
            allocator: TrackAllocator::new(config.initial_track_id),
            config,
            names,
            dispatcher,
            logger: Box::new(NullPipelineLogger),
        })
    }

    pub fn set_logger(&mut self, logger: Box<dyn PipelineLogger>) {
        self.logger = logger;
    }

    /// Detects, tracks and liveness-checks the faces in `frame`.
    ///
    /// Engine failures and track-ID exhaustion are reported to the listener
    /// and yield an empty list for this frame; the next frame starts fresh.
    pub fn process_frame(&mut self, frame: &Frame) -> Vec<FacePreview> {
        let start = Instant::now();
        let faces = match self.engine.detect_faces(frame) {
            Ok(faces) => faces,
            Err(e) => {
                self.report(PipelineError::Detection(e));
                Vec::new()
            }
        };
        let faces = if self.config.single_face {
            keep_largest_face(faces)
        } else {
            faces
        };
        self.logger.timing("detect", elapsed_ms(start));

        let start = Instant::now();
        let rects: Vec<Rect> = faces.iter().map(|f| f.rect).collect();
        let (faces, track_ids) = match self.allocator.assign(&rects) {
            Ok(track_ids) => (faces, track_ids),
            Err(e) => {
                self.report(e.into());
                (Vec::new(), Vec::new())
            }
        };
        self.logger.timing("track", elapsed_ms(start));

        let start = Instant::now();
        let previews = self.check_liveness(frame, faces, &track_ids);
        self.logger.timing("liveness", elapsed_ms(start));

        let current: HashSet<u32> = track_ids.into_iter().collect();
        self.names.prune(&current);

        self.logger
            .metric("pending_jobs", self.dispatcher.pending() as f64);
        self.logger.frame(frame.index(), previews.len());
        previews
    }

    fn check_liveness(
        &self,
        frame: &Frame,
        faces: Vec<DetectedFace>,
        track_ids: &[u32],
    ) -> Vec<FacePreview> {
        if faces.is_empty() {
            return Vec::new();
        }
        let liveness = match self.engine.liveness(frame, &faces) {
            Ok(liveness) => liveness,
            Err(e) => {
                self.report(PipelineError::Liveness(e));
                return Vec::new();
            }
        };
        if liveness.len() != faces.len() {
            self.report(PipelineError::LivenessMismatch {
                faces: faces.len(),
                liveness: liveness.len(),
            });
            return Vec::new();
        }

        faces
            .into_iter()
            .zip(liveness)
            .zip(track_ids)
            .map(|((face, liveness), &track_id)| FacePreview {
                face,
                liveness,
                track_id,
            })
            .collect()
    }

    fn report(&self, error: PipelineError) {
        log::warn!("{error}");
        self.listener.on_fail(&error);
    }

    /// Asks the recognition worker for `face`'s feature.
    ///
    /// Returns `false` when the request was dropped by backpressure; the
    /// listener then has already received `on_feature(track_id, None)`.
    pub fn request_feature(&self, track_id: u32, frame: &Frame, face: &DetectedFace) -> bool {
        self.dispatcher
            .submit(RecognitionJob::new(track_id, frame, face))
    }

    pub fn bind_name(&self, track_id: u32, name: impl Into<String>) {
        self.names.bind(track_id, name);
    }

    pub fn name_of(&self, track_id: u32) -> Option<String> {
        self.names.lookup(track_id)
    }

    pub fn names(&self) -> Arc<NameBindings> {
        Arc::clone(&self.names)
    }

    /// Highest track ID issued so far; persist it to continue numbering in
    /// a later session.
    pub fn current_track_id(&self) -> u32 {
        self.allocator.last_track_id()
    }

    pub fn tracked(&self) -> &[TrackedFace] {
        self.allocator.tracked()
    }

    pub fn log_summary(&self) {
        self.logger.summary();
    }

    /// Stops recognition and forgets all names. Frames can still be
    /// processed afterwards, but every feature request is rejected.
    pub fn release(&self) {
        self.dispatcher.release();
        self.names.clear();
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::domain::face_engine::{EngineError, FeatureVector};
    use crate::engine::infrastructure::scripted_engine::{
        EngineScript, ScriptedEngine, ScriptedFace, ScriptedFrame,
    };
    use crate::shared::frame::PixelFormat;
    use crate::tracking::domain::track_allocator::TrackIdsExhausted;
    use crossbeam_channel::{Receiver, Sender};
    use parking_lot::Mutex;
    use std::time::Duration;

    struct RecordingListener {
        failures: Mutex<Vec<PipelineError>>,
        features: Sender<(u32, Option<FeatureVector>)>,
    }

    impl PipelineListener for RecordingListener {
        fn on_feature(&self, track_id: u32, feature: Option<FeatureVector>) {
            let _ = self.features.send((track_id, feature));
        }

        fn on_fail(&self, error: &PipelineError) {
            self.failures.lock().push(error.clone());
        }
    }

    fn listener() -> (Arc<RecordingListener>, Receiver<(u32, Option<FeatureVector>)>) {
        let (features, rx) = crossbeam_channel::unbounded();
        let listener = Arc::new(RecordingListener {
            failures: Mutex::new(Vec::new()),
            features,
        });
        (listener, rx)
    }

    fn frame(index: usize) -> Frame {
        Frame::blank(640, 480, PixelFormat::Nv21, index)
    }

    fn faces(rects: &[Rect]) -> ScriptedFrame {
        ScriptedFrame {
            faces: rects.iter().map(|r| ScriptedFace::new(*r)).collect(),
            ..Default::default()
        }
    }

    fn pipeline_for(
        frames: Vec<ScriptedFrame>,
        config: PipelineConfig,
    ) -> (FacePipeline, Arc<RecordingListener>, Receiver<(u32, Option<FeatureVector>)>) {
        let engine = Arc::new(ScriptedEngine::new(EngineScript {
            frames,
            extract_delay_ms: 0,
        }));
        let (listener, rx) = listener();
        let pipeline = FacePipeline::new(engine, listener.clone(), config).unwrap();
        (pipeline, listener, rx)
    }

    fn multi_face() -> PipelineConfig {
        PipelineConfig {
            single_face: false,
            ..Default::default()
        }
    }

    const FACE_A: Rect = Rect::new(100, 100, 200, 200);
    const FACE_B: Rect = Rect::new(400, 100, 460, 160);

    #[test]
    fn test_empty_frame_yields_empty_result() {
        let (mut pipeline, listener, _rx) =
            pipeline_for(vec![ScriptedFrame::default()], PipelineConfig::default());

        assert!(pipeline.process_frame(&frame(0)).is_empty());
        assert!(pipeline.tracked().is_empty());
        assert_eq!(pipeline.current_track_id(), 0);
        assert!(listener.failures.lock().is_empty());
    }

    #[test]
    fn test_face_keeps_track_id_across_frames() {
        let moved = Rect::new(110, 105, 210, 205);
        let (mut pipeline, _listener, _rx) = pipeline_for(
            vec![faces(&[FACE_A]), faces(&[moved])],
            PipelineConfig::default(),
        );

        let first = pipeline.process_frame(&frame(0));
        let second = pipeline.process_frame(&frame(1));

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].track_id, 1);
        assert_eq!(first[0].liveness, Liveness::Alive);
        assert_eq!(second[0].track_id, 1);
        assert_eq!(second[0].face.rect, moved);
    }

    #[test]
    fn test_initial_track_id_seeds_numbering() {
        let config = PipelineConfig {
            initial_track_id: 41,
            ..Default::default()
        };
        let (mut pipeline, _listener, _rx) = pipeline_for(vec![faces(&[FACE_A])], config);

        assert_eq!(pipeline.process_frame(&frame(0))[0].track_id, 42);
        assert_eq!(pipeline.current_track_id(), 42);
    }

    #[test]
    fn test_exhausted_track_ids_are_reported_not_wrapped() {
        let config = PipelineConfig {
            initial_track_id: u32::MAX - 1,
            single_face: false,
            ..Default::default()
        };
        let (mut pipeline, listener, _rx) = pipeline_for(
            vec![faces(&[FACE_A, FACE_B]), faces(&[FACE_A])],
            config,
        );

        assert!(pipeline.process_frame(&frame(0)).is_empty());
        assert_eq!(
            listener.failures.lock().as_slice(),
            &[PipelineError::TrackIds(TrackIdsExhausted {
                last_track_id: u32::MAX - 1,
                needed: 2
            })]
        );

        // The last remaining ID is still usable.
        assert_eq!(pipeline.process_frame(&frame(1))[0].track_id, u32::MAX);
        assert_eq!(pipeline.current_track_id(), u32::MAX);
    }

    #[test]
    fn test_single_face_policy_keeps_largest() {
        let (mut pipeline, _listener, _rx) =
            pipeline_for(vec![faces(&[FACE_B, FACE_A])], PipelineConfig::default());

        let result = pipeline.process_frame(&frame(0));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].face.rect, FACE_A);
    }

    #[test]
    fn test_multi_face_keeps_detection_order() {
        let (mut pipeline, _listener, _rx) =
            pipeline_for(vec![faces(&[FACE_B, FACE_A])], multi_face());

        let result = pipeline.process_frame(&frame(0));
        let rects: Vec<Rect> = result.iter().map(|p| p.face.rect).collect();
        let ids: Vec<u32> = result.iter().map(|p| p.track_id).collect();
        assert_eq!(rects, vec![FACE_B, FACE_A]);
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_detection_failure_is_reported_and_frame_is_empty() {
        let failing = ScriptedFrame {
            detect_error: Some(5),
            ..Default::default()
        };
        let (mut pipeline, listener, _rx) = pipeline_for(
            vec![faces(&[FACE_A]), failing, faces(&[FACE_A])],
            PipelineConfig::default(),
        );

        let first = pipeline.process_frame(&frame(0));
        assert!(pipeline.process_frame(&frame(1)).is_empty());
        let third = pipeline.process_frame(&frame(2));

        assert_eq!(
            listener.failures.lock().as_slice(),
            &[PipelineError::Detection(EngineError::Status {
                operation: "detect",
                code: 5
            })]
        );
        // The failed frame broke continuity.
        assert!(third[0].track_id > first[0].track_id);
    }

    #[test]
    fn test_liveness_failure_degrades_to_empty() {
        let failing = ScriptedFrame {
            liveness_error: Some(3),
            ..faces(&[FACE_A])
        };
        let (mut pipeline, listener, _rx) =
            pipeline_for(vec![failing, faces(&[FACE_A])], PipelineConfig::default());

        assert!(pipeline.process_frame(&frame(0)).is_empty());
        assert!(matches!(
            listener.failures.lock()[0],
            PipelineError::Liveness(_)
        ));
        // Tracking still advanced, so the face keeps its ID next frame.
        assert_eq!(pipeline.process_frame(&frame(1))[0].track_id, 1);
    }

    struct ShortLivenessEngine;

    impl FaceEngine for ShortLivenessEngine {
        fn detect_faces(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, EngineError> {
            Ok(vec![DetectedFace::new(FACE_A), DetectedFace::new(FACE_B)])
        }

        fn liveness(
            &self,
            _frame: &Frame,
            _faces: &[DetectedFace],
        ) -> Result<Vec<Liveness>, EngineError> {
            Ok(vec![Liveness::Alive])
        }

        fn extract_feature(
            &self,
            _frame: &Frame,
            _face: &DetectedFace,
        ) -> Result<FeatureVector, EngineError> {
            Err(EngineError::Other("unused".into()))
        }
    }

    #[test]
    fn test_liveness_length_mismatch_returns_empty() {
        let (listener, _rx) = listener();
        let mut pipeline =
            FacePipeline::new(Arc::new(ShortLivenessEngine), listener.clone(), multi_face())
                .unwrap();

        assert!(pipeline.process_frame(&frame(0)).is_empty());
        assert_eq!(
            listener.failures.lock().as_slice(),
            &[PipelineError::LivenessMismatch {
                faces: 2,
                liveness: 1
            }]
        );
    }

    #[test]
    fn test_names_pruned_when_track_leaves() {
        let (mut pipeline, _listener, _rx) = pipeline_for(
            vec![faces(&[FACE_A, FACE_B]), faces(&[FACE_A])],
            multi_face(),
        );

        let first = pipeline.process_frame(&frame(0));
        pipeline.bind_name(first[0].track_id, "alice");
        pipeline.bind_name(first[1].track_id, "bob");

        pipeline.process_frame(&frame(1));
        assert_eq!(pipeline.name_of(first[0].track_id).as_deref(), Some("alice"));
        assert_eq!(pipeline.name_of(first[1].track_id), None);
    }

    #[test]
    fn test_request_feature_delivers_to_listener() {
        let scripted = ScriptedFrame {
            faces: vec![ScriptedFace {
                feature: Some(vec![9, 8, 7]),
                ..ScriptedFace::new(FACE_A)
            }],
            ..Default::default()
        };
        let (mut pipeline, _listener, rx) =
            pipeline_for(vec![scripted], PipelineConfig::default());

        let current = frame(0);
        let preview = pipeline.process_frame(&current);
        assert!(pipeline.request_feature(preview[0].track_id, &current, &preview[0].face));

        let (track_id, feature) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(track_id, preview[0].track_id);
        assert_eq!(feature, Some(FeatureVector(vec![9, 8, 7])));
    }

    #[test]
    fn test_recognition_disabled_rejects_requests() {
        let config = PipelineConfig {
            recognition_enabled: false,
            worker_slots: 0,
            ..Default::default()
        };
        let (mut pipeline, _listener, rx) = pipeline_for(vec![faces(&[FACE_A])], config);

        let current = frame(0);
        let preview = pipeline.process_frame(&current);
        assert!(!pipeline.request_feature(preview[0].track_id, &current, &preview[0].face));
        assert_eq!(rx.try_recv().unwrap(), (preview[0].track_id, None));
    }

    #[test]
    fn test_release_rejects_requests_and_clears_names() {
        let (mut pipeline, _listener, rx) =
            pipeline_for(vec![faces(&[FACE_A])], PipelineConfig::default());

        let current = frame(0);
        let preview = pipeline.process_frame(&current);
        pipeline.bind_name(preview[0].track_id, "alice");

        pipeline.release();
        pipeline.release();

        assert_eq!(pipeline.name_of(preview[0].track_id), None);
        assert!(!pipeline.request_feature(preview[0].track_id, &current, &preview[0].face));
        assert_eq!(rx.try_recv().unwrap(), (preview[0].track_id, None));
    }

    #[test]
    fn test_invalid_config_fails_to_build() {
        let engine = Arc::new(ScriptedEngine::new(EngineScript::default()));
        let (listener, _rx) = listener();
        let config = PipelineConfig {
            worker_slots: 0,
            ..Default::default()
        };
        assert!(matches!(
            FacePipeline::new(engine, listener, config),
            Err(PipelineBuildError::Config(ConfigError::ZeroWorkerSlots))
        ));
    }

    #[test]
    fn test_shared_name_store() {
        let engine = Arc::new(ScriptedEngine::new(EngineScript::default()));
        let (listener, _rx) = listener();
        let names = Arc::new(NameBindings::new());
        let pipeline =
            FacePipeline::with_names(engine, listener, Arc::clone(&names), PipelineConfig::default())
                .unwrap();

        names.bind(3, "carol");
        assert_eq!(pipeline.name_of(3).as_deref(), Some("carol"));
    }
}
