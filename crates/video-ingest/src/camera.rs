//! OpenCV-backed camera capture.

use chrono::Utc;
use opencv::{
    core::{Mat, MatTraitConst, MatTraitConstManual},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
};
use tracing::{debug, info, warn};

use crate::types::{CaptureError, Frame, FrameFormat, FrameSource};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSettings {
    /// Requested capture size, the device may pick something else.
    pub width: i32,
    pub height: i32,
    pub fps: f64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}

/// Camera handle opened once and released on drop.
pub struct Camera {
    uri: String,
    cap: VideoCapture,
    scratch: Mat,
    released: bool,
}

impl Camera {
    pub fn open(uri: &str, settings: CameraSettings) -> Result<Self, CaptureError> {
        let mut cap = open_video_capture(uri)?;
        configure_camera(&mut cap, settings);
        info!(
            uri,
            width = settings.width,
            height = settings.height,
            "camera opened"
        );
        Ok(Self {
            uri: uri.to_string(),
            cap,
            scratch: Mat::default(),
            released: false,
        })
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.cap.release() {
            warn!("failed to release camera {}: {err}", self.uri);
        } else {
            debug!(uri = %self.uri, "camera released");
        }
    }
}

impl FrameSource for Camera {
    fn is_open(&self) -> bool {
        !self.released && self.cap.is_opened().unwrap_or(false)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        match self.cap.read(&mut self.scratch) {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(err) => return Err(CaptureError::Other(err.into())),
        }

        let size = self
            .scratch
            .size()
            .map_err(|e| CaptureError::Other(e.into()))?;
        if size.width <= 0 || size.height <= 0 {
            return Ok(None);
        }

        let data = self
            .scratch
            .data_bytes()
            .map_err(|e| CaptureError::Other(e.into()))?
            .to_vec();
        let expected =
            size.width as usize * size.height as usize * FrameFormat::Bgr8.bytes_per_pixel();
        if data.len() != expected {
            return Err(CaptureError::BufferSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(Some(Frame {
            data,
            width: size.width,
            height: size.height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        }))
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.release();
    }
}

/// Parse a `/dev/videoX` style URI and return the zero-based index if present.
pub fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return Some(index);
    }
    if let Some(stripped) = uri.strip_prefix("/dev/video") {
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            return stripped.parse::<i32>().ok();
        }
    }
    None
}

/// Attempt to open a camera input either by index or URI.
fn open_video_capture(uri: &str) -> Result<VideoCapture, CaptureError> {
    if let Some(index) = parse_device_index(uri) {
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            match VideoCapture::new(index, backend) {
                Ok(cap) => {
                    if cap.is_opened().map_err(|e| CaptureError::Other(e.into()))? {
                        return Ok(cap);
                    }
                }
                Err(err) => {
                    warn!("failed to open device #{index} with backend {backend}: {err}");
                }
            }
        }
    }

    for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
        match VideoCapture::from_file(uri, backend) {
            Ok(cap) => {
                if cap.is_opened().map_err(|e| CaptureError::Other(e.into()))? {
                    return Ok(cap);
                }
            }
            Err(err) => {
                warn!("failed to open {uri} with backend {backend}: {err}");
            }
        }
    }

    Err(CaptureError::Open {
        uri: uri.to_string(),
    })
}

/// Apply common capture settings (resolution, fps, preferred pixel format).
fn configure_camera(cap: &mut VideoCapture, settings: CameraSettings) {
    let mut fourcc_set = false;
    if let Ok(mjpg) = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G') {
        if matches!(cap.set(videoio::CAP_PROP_FOURCC, mjpg as f64), Ok(true)) {
            fourcc_set = true;
        }
    }
    if !fourcc_set {
        if let Ok(yuyv) = videoio::VideoWriter::fourcc('Y', 'U', 'Y', 'V') {
            let _ = cap.set(videoio::CAP_PROP_FOURCC, yuyv as f64);
        }
    }
    let _ = cap.set(videoio::CAP_PROP_FRAME_WIDTH, settings.width as f64);
    let _ = cap.set(videoio::CAP_PROP_FRAME_HEIGHT, settings.height as f64);
    let _ = cap.set(videoio::CAP_PROP_FPS, settings.fps);
}
