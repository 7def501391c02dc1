/// Minimum share of each rectangle that must lie inside the overlap for two
/// detections in consecutive frames to be treated as the same face.
pub const SAME_FACE_SIMILARITY: f64 = 0.3;

/// Default recognition queue capacity; matches the engine's usual
/// maximum face count.
pub const DEFAULT_WORKER_SLOTS: usize = 5;

/// Track IDs are issued starting one above this seed.
pub const DEFAULT_INITIAL_TRACK_ID: u32 = 0;

pub const RECOGNITION_THREAD_NAME: &str = "face-recognition";

pub const STATE_DIR_NAME: &str = "facetrack";
pub const STATE_FILE_NAME: &str = "state.json";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
