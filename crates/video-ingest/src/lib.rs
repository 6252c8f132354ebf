//! Camera acquisition for the gesture pipeline.

mod camera;
mod types;

pub use camera::{Camera, CameraSettings, parse_device_index};
pub use types::{CaptureError, Frame, FrameFormat, FrameSource};
