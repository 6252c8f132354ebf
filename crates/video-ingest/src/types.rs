use anyhow::Error;
use thiserror::Error;

/// Raw frame captured from a video source.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
}

impl FrameFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            FrameFormat::Bgr8 => 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error(transparent)]
    Other(#[from] Error),
}

/// Pull-based frame producer.
///
/// `read_frame` returning `Ok(None)` signals a transient read miss; callers
/// are expected to retry while `is_open` holds.
pub trait FrameSource {
    fn is_open(&self) -> bool;

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        (**self).read_frame()
    }
}
