use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;

use facetrack_core::engine::domain::face_engine::{FeatureVector, Liveness};
use facetrack_core::engine::infrastructure::scripted_engine::ScriptedEngine;
use facetrack_core::pipeline::face_pipeline::{FacePipeline, FacePreview};
use facetrack_core::pipeline::pipeline_config::PipelineConfig;
use facetrack_core::pipeline::pipeline_listener::{PipelineError, PipelineListener};
use facetrack_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facetrack_core::recognition::domain::recognition_job::AdmissionPolicy;
use facetrack_core::shared::frame::PixelFormat;
use facetrack_core::source::domain::frame_source::FrameSource;
use facetrack_core::source::infrastructure::image_sequence_source::{
    BlankFrameSource, ImageSequenceSource,
};
use facetrack_core::tracking::domain::name_bindings::NameBindings;
use facetrack_core::tracking::domain::track_seed_store::TrackSeedStore;
use facetrack_core::tracking::infrastructure::json_track_seed_store::JsonTrackSeedStore;

/// Replays a scripted face engine through the tracking pipeline.
#[derive(Parser)]
#[command(name = "facetrack")]
struct Cli {
    /// JSON script with per-frame detections and an optional gallery.
    script: PathBuf,

    /// Directory of images to use as frames (blank frames otherwise).
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Blank frame width when --frames is not given.
    #[arg(long, default_value = "640")]
    width: u32,

    /// Blank frame height when --frames is not given.
    #[arg(long, default_value = "480")]
    height: u32,

    /// Pipeline config JSON file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recognition queue capacity.
    #[arg(long)]
    worker_slots: Option<usize>,

    /// Track every face instead of only the largest.
    #[arg(long)]
    multi_face: bool,

    /// Queue recognition requests while the worker is busy.
    #[arg(long)]
    queue_while_busy: bool,

    /// Track-ID state file (defaults to the user config directory).
    #[arg(long)]
    seed_file: Option<PathBuf>,

    /// Do not load or save the last track ID.
    #[arg(long)]
    no_persist: bool,

    /// Minimum cosine similarity for a gallery match (0.0-1.0).
    #[arg(long, default_value = "0.8")]
    match_threshold: f64,

    /// Log a progress line every N frames.
    #[arg(long, default_value = "30")]
    log_every: usize,
}

#[derive(Debug, Default, Deserialize)]
struct GalleryFile {
    #[serde(default)]
    gallery: Vec<GalleryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct GalleryEntry {
    name: String,
    feature: Vec<u8>,
}

/// Matches delivered features against the gallery and binds names.
struct GalleryListener {
    names: Arc<NameBindings>,
    gallery: Vec<GalleryEntry>,
    threshold: f64,
    failures: AtomicUsize,
}

impl PipelineListener for GalleryListener {
    fn on_feature(&self, track_id: u32, feature: Option<FeatureVector>) {
        let Some(feature) = feature else {
            return;
        };
        match best_match(&self.gallery, feature.as_bytes(), self.threshold) {
            Some((entry, score)) => {
                log::info!("Track {track_id} recognized as {} ({score:.3})", entry.name);
                self.names.bind(track_id, entry.name.clone());
            }
            None => log::debug!("Track {track_id} matched nobody in the gallery"),
        }
    }

    fn on_fail(&self, _error: &PipelineError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let seed_store = build_seed_store(&cli)?;
    let mut config = load_config(&cli)?;
    if let Some(store) = &seed_store {
        config.initial_track_id = config.initial_track_id.max(store.load()?);
    }

    let engine = Arc::new(ScriptedEngine::from_file(&cli.script)?);
    let names = Arc::new(NameBindings::new());
    let listener = Arc::new(GalleryListener {
        names: Arc::clone(&names),
        gallery: load_gallery(&cli.script)?,
        threshold: cli.match_threshold,
        failures: AtomicUsize::new(0),
    });

    let mut source: Box<dyn FrameSource> = match &cli.frames {
        Some(dir) => Box::new(ImageSequenceSource::open(dir)?),
        None => Box::new(BlankFrameSource::new(
            cli.width,
            cli.height,
            PixelFormat::Nv21,
            engine.frame_count(),
        )),
    };

    let (width, height) = source.dimensions();
    match source.len_hint() {
        Some(count) => log::info!("Replaying {count} frames at {width}x{height}"),
        None => log::info!("Replaying frames at {width}x{height}"),
    }

    let mut pipeline = FacePipeline::with_names(engine, listener.clone(), names, config)?;
    pipeline.set_logger(Box::new(StdoutPipelineLogger::new(cli.log_every)));

    for frame in source.frames() {
        let frame = frame?;
        let previews = pipeline.process_frame(&frame);
        for preview in &previews {
            let name = pipeline.name_of(preview.track_id);
            if name.is_none() && preview.liveness == Liveness::Alive {
                pipeline.request_feature(preview.track_id, &frame, &preview.face);
            }
            println!("{}", describe(frame.index(), preview, name));
        }
    }

    pipeline.release();
    pipeline.log_summary();

    if let Some(store) = &seed_store {
        store.save(pipeline.current_track_id())?;
    }

    let failures = listener.failures.load(Ordering::Relaxed);
    if failures > 0 {
        log::warn!("{failures} engine failures reported");
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.match_threshold) {
        return Err("--match-threshold must be between 0.0 and 1.0".into());
    }
    if cli.frames.is_none() && (cli.width == 0 || cli.height == 0) {
        return Err("--width and --height must be > 0".into());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    if let Some(slots) = cli.worker_slots {
        config.worker_slots = slots;
    }
    if cli.multi_face {
        config.single_face = false;
    }
    if cli.queue_while_busy {
        config.admission = AdmissionPolicy::QueueWhileBusy;
    }
    config.validate()?;
    Ok(config)
}

fn build_seed_store(cli: &Cli) -> Result<Option<JsonTrackSeedStore>, Box<dyn std::error::Error>> {
    if cli.no_persist {
        return Ok(None);
    }
    let store = match &cli.seed_file {
        Some(path) => JsonTrackSeedStore::new(path),
        None => JsonTrackSeedStore::in_config_dir()?,
    };
    Ok(Some(store))
}

fn load_gallery(script: &Path) -> Result<Vec<GalleryEntry>, Box<dyn std::error::Error>> {
    let file: GalleryFile = serde_json::from_str(&std::fs::read_to_string(script)?)?;
    Ok(file.gallery)
}

fn describe(frame_index: usize, preview: &FacePreview, name: Option<String>) -> String {
    let r = preview.face.rect;
    format!(
        "frame {frame_index:5}  track {:4}  [{}, {}, {}, {}]  {:?}  {}",
        preview.track_id,
        r.left,
        r.top,
        r.right,
        r.bottom,
        preview.liveness,
        name.as_deref().unwrap_or("-")
    )
}

/// Highest-scoring gallery entry at or above `threshold`.
fn best_match<'a>(
    gallery: &'a [GalleryEntry],
    feature: &[u8],
    threshold: f64,
) -> Option<(&'a GalleryEntry, f64)> {
    gallery
        .iter()
        .map(|entry| (entry, cosine_similarity(&entry.feature, feature)))
        .filter(|(_, score)| *score >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

fn cosine_similarity(a: &[u8], b: &[u8]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
    let norm_a: f64 = a.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
