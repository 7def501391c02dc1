use crate::shared::frame::Frame;

/// Supplies camera frames in capture order.
///
/// Implementations own I/O and decoding; the pipeline only sees [`Frame`]s.
pub trait FrameSource: Send {
    /// Frame size shared by every frame the source yields.
    fn dimensions(&self) -> (u32, u32);

    /// Number of frames the source will yield, if known.
    fn len_hint(&self) -> Option<usize> {
        None
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;
}
