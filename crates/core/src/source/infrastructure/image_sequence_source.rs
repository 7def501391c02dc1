use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{Frame, PixelFormat};
use crate::source::domain::frame_source::FrameSource;

/// Replays a directory of still images as a camera stream.
///
/// Files are ordered by name and decoded lazily to RGB24. Every image must
/// match the size of the first one, as a real camera would.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| format!("no images found in {}", dir.display()))?;
        let (width, height) = image::image_dimensions(first)?;
        log::info!(
            "Replaying {} images ({width}x{height}) from {}",
            paths.len(),
            dir.display()
        );

        Ok(Self {
            paths,
            width,
            height,
        })
    }

    fn decode(&self, index: usize, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let rgb = image::open(path)?.to_rgb8();
        if rgb.dimensions() != (self.width, self.height) {
            return Err(format!(
                "{} is {}x{}, expected {}x{}",
                path.display(),
                rgb.width(),
                rgb.height(),
                self.width,
                self.height
            )
            .into());
        }
        Ok(Frame::new(
            rgb.into_raw(),
            self.width,
            self.height,
            PixelFormat::Rgb24,
            index,
        ))
    }
}

impl FrameSource for ImageSequenceSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.paths.len())
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        Box::new(
            self.paths
                .iter()
                .enumerate()
                .map(|(i, path)| self.decode(i, path)),
        )
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Yields `count` zero-filled frames; for replaying detections without
/// image data.
pub struct BlankFrameSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    count: usize,
}

impl BlankFrameSource {
    pub fn new(width: u32, height: u32, format: PixelFormat, count: usize) -> Self {
        Self {
            width,
            height,
            format,
            count,
        }
    }
}

impl FrameSource for BlankFrameSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.count)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let (width, height, format) = (self.width, self.height, self.format);
        Box::new((0..self.count).map(move |i| Ok(Frame::blank(width, height, format, i))))
    }
}
