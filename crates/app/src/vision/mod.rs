//! Webcam hand tracking that classifies thumb gestures and either shows the
//! annotated feed locally or serves it over HTTP.
//!
//! The module is split into focused submodules:
//! - `config`: CLI arguments and their validated counterparts.
//! - `pipeline`: The capture → detect → classify → sink loop and both entry points.
//! - `annotation`: BGR → RGB conversion and skeleton drawing.
//! - `sink`: Frame consumers driven by the loop.
//! - `display`: OpenCV preview window with the gesture emoji overlay.
//! - `encoding`: JPEG encoding of published previews.
//! - `data`: State shared between the producer and the HTTP server.
//! - `server`: Actix Web gesture, video, and metrics endpoints.
//! - `telemetry`: Tracing and Prometheus setup.

pub use config::{CaptureArgs, DisplayArgs, StreamArgs};
pub use pipeline::{run_serve, run_window};

pub(crate) use telemetry::init_subscriber;

mod annotation;
mod config;
mod data;
mod display;
mod encoding;
mod pipeline;
mod server;
mod sink;
mod telemetry;
