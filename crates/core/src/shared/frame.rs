use ndarray::{Array2, ArrayView2, ArrayView3, ShapeError};
use serde::{Deserialize, Serialize};

/// Pixel layout of a frame buffer as delivered by the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Full-resolution Y plane followed by interleaved VU at quarter resolution.
    Nv21,
    Rgb24,
    Bgr24,
    Gray8,
}

impl PixelFormat {
    /// Number of bytes a `width x height` frame occupies in this format.
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Nv21 => pixels * 3 / 2,
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => pixels * 3,
            PixelFormat::Gray8 => pixels,
        }
    }
}

/// A single camera frame.
///
/// The pipeline only borrows frames; a recognition request clones the
/// frame so the worker owns its copy independently of the camera buffer.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            format.frame_len(width, height),
            "data length must match width, height and pixel format"
        );
        Self {
            data,
            width,
            height,
            format,
            index,
        }
    }

    /// A zero-filled frame, used when replaying detections without images.
    pub fn blank(width: u32, height: u32, format: PixelFormat, index: usize) -> Self {
        Self::new(
            vec![0u8; format.frame_len(width, height)],
            width,
            height,
            format,
            index,
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Luminance plane as a `(height, width)` array.
    ///
    /// NV21 and gray frames expose their first plane directly; packed
    /// color frames are converted with BT.601 weights. Fails when the
    /// buffer is too short for the frame's dimensions.
    pub fn luma(&self) -> Result<Array2<u8>, ShapeError> {
        let (h, w) = (self.height as usize, self.width as usize);
        let luma = match self.format {
            PixelFormat::Nv21 | PixelFormat::Gray8 => self.first_plane()?.to_owned(),
            PixelFormat::Rgb24 => {
                let px = self.packed()?;
                Array2::from_shape_fn((h, w), |(y, x)| {
                    bt601(px[[y, x, 0]], px[[y, x, 1]], px[[y, x, 2]])
                })
            }
            PixelFormat::Bgr24 => {
                let px = self.packed()?;
                Array2::from_shape_fn((h, w), |(y, x)| {
                    bt601(px[[y, x, 2]], px[[y, x, 1]], px[[y, x, 0]])
                })
            }
        };
        Ok(luma)
    }

    fn first_plane(&self) -> Result<ArrayView2<'_, u8>, ShapeError> {
        let len = (self.width as usize * self.height as usize).min(self.data.len());
        ArrayView2::from_shape(
            (self.height as usize, self.width as usize),
            &self.data[..len],
        )
    }

    fn packed(&self) -> Result<ArrayView3<'_, u8>, ShapeError> {
        let len = (self.width as usize * self.height as usize * 3).min(self.data.len());
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, 3),
            &self.data[..len],
        )
    }
}

fn bt601(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}
