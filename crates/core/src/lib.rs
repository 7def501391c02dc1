//! Real-time face tracking with asynchronous, backpressured recognition.
//!
//! [`pipeline::face_pipeline::FacePipeline`] is the entry point: feed it one
//! frame at a time and it returns the visible faces with stable track IDs
//! and liveness, while feature extraction runs on a single background
//! worker behind a bounded queue.

pub mod engine;
pub mod pipeline;
pub mod recognition;
pub mod shared;
pub mod source;
pub mod tracking;
