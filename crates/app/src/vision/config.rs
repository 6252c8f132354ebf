//! Configuration parsing for the gesture pipeline.
//!
//! Defaults reproduce the fixed setup the service has always run with: camera
//! 0, `hand_landmarker.task` next to the binary, `127.0.0.1:8000`, and a
//! single allowed frontend origin.

use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::Args;
use ml_core::{BridgeCommand, DetectorOptions};
use video_ingest::CameraSettings;

use crate::vision::annotation::LandmarkStyle;

pub(crate) const DEFAULT_MODEL_PATH: &str = "hand_landmarker.task";
pub(crate) const DEFAULT_WINDOW_TITLE: &str = "Hand Tracking";

/// Capture and detection flags shared by every entry point.
#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Camera index or URI.
    #[arg(long = "camera", value_name = "URI", default_value = "0")]
    pub camera_uri: String,
    /// Hand landmark model (`.task`, or `.pt`/`.ts` with the `with-tch` feature).
    #[arg(long = "model", value_name = "PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,
    /// Requested capture width in pixels.
    #[arg(long = "width", value_name = "PX", default_value_t = 640)]
    pub width: i32,
    /// Requested capture height in pixels.
    #[arg(long = "height", value_name = "PX", default_value_t = 480)]
    pub height: i32,
    /// Keep the raw camera orientation instead of the selfie view.
    #[arg(long = "no-mirror", action = clap::ArgAction::SetTrue)]
    pub no_mirror: bool,
    /// Radius of the landmark dots in pixels.
    #[arg(long = "landmark-radius", value_name = "PX", default_value_t = 4)]
    pub landmark_radius: u32,
    /// Maximum number of hands reported per frame.
    #[arg(long = "num-hands", value_name = "N", default_value_t = 2)]
    pub num_hands: usize,
    /// Interpreter hosting the MediaPipe bridge.
    #[arg(long = "bridge-python", value_name = "PATH", default_value = "python3")]
    pub bridge_python: PathBuf,
    /// MediaPipe bridge script.
    #[arg(
        long = "bridge-script",
        value_name = "PATH",
        default_value = "scripts/hand_landmarker_bridge.py"
    )]
    pub bridge_script: PathBuf,
}

/// Flags for the local preview window.
#[derive(Debug, Args)]
pub struct DisplayArgs {
    /// Emoji font used for the gesture overlay; falls back to a built-in font.
    #[arg(long = "emoji-font", value_name = "PATH", default_value = "seguiemj.ttf")]
    pub emoji_font: PathBuf,
}

/// Flags for the HTTP surface.
#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Address the HTTP server binds to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    pub host: String,
    /// Port the HTTP server listens on.
    #[arg(long = "port", default_value_t = 8000)]
    pub port: u16,
    /// The single origin allowed by CORS.
    #[arg(long = "cors-origin", value_name = "ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,
    /// Width of the published preview frames.
    #[arg(long = "stream-width", value_name = "PX", default_value_t = 320)]
    pub stream_width: u32,
    /// Height of the published preview frames.
    #[arg(long = "stream-height", value_name = "PX", default_value_t = 240)]
    pub stream_height: u32,
    /// JPEG quality of published frames (1-100).
    #[arg(long = "jpeg-quality", value_name = "QUALITY", default_value_t = 50)]
    pub jpeg_quality: i32,
    /// Delay between MJPEG parts.
    #[arg(long = "stream-interval-ms", value_name = "MS", default_value_t = 33)]
    pub stream_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub camera_uri: String,
    pub camera: CameraSettings,
    pub model_path: PathBuf,
    pub detector: DetectorOptions,
    pub bridge: BridgeCommand,
    pub mirror: bool,
    pub style: LandmarkStyle,
}

#[derive(Clone, Debug)]
pub struct DisplayConfig {
    pub window_title: String,
    pub emoji_font: PathBuf,
}

#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
    pub interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            cors_origin: "http://localhost:3000".into(),
            width: 320,
            height: 240,
            jpeg_quality: 50,
            interval: Duration::from_millis(33),
        }
    }
}

impl TryFrom<CaptureArgs> for CaptureConfig {
    type Error = anyhow::Error;

    fn try_from(args: CaptureArgs) -> Result<Self> {
        if args.camera_uri.trim().is_empty() {
            bail!("--camera must not be empty");
        }
        if args.width <= 0 || args.height <= 0 {
            bail!("Capture width and height must be positive integers");
        }
        if args.num_hands == 0 {
            bail!("--num-hands must be at least 1");
        }
        if args.landmark_radius == 0 {
            bail!("--landmark-radius must be at least 1");
        }

        Ok(Self {
            camera_uri: args.camera_uri,
            camera: CameraSettings {
                width: args.width,
                height: args.height,
                ..CameraSettings::default()
            },
            model_path: args.model_path,
            detector: DetectorOptions {
                num_hands: args.num_hands,
                ..DetectorOptions::default()
            },
            bridge: BridgeCommand {
                program: args.bridge_python,
                script: args.bridge_script,
            },
            mirror: !args.no_mirror,
            style: LandmarkStyle {
                point_radius: args.landmark_radius,
                ..LandmarkStyle::default()
            },
        })
    }
}

impl From<DisplayArgs> for DisplayConfig {
    fn from(args: DisplayArgs) -> Self {
        Self {
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
            emoji_font: args.emoji_font,
        }
    }
}

impl TryFrom<StreamArgs> for StreamConfig {
    type Error = anyhow::Error;

    fn try_from(args: StreamArgs) -> Result<Self> {
        if !(1..=100).contains(&args.jpeg_quality) {
            bail!("--jpeg-quality must be an integer between 1 and 100");
        }
        if args.stream_width == 0 || args.stream_height == 0 {
            bail!("Stream width and height must be positive integers");
        }
        if args.stream_interval_ms == 0 {
            bail!("--stream-interval-ms must be at least 1");
        }
        if !args.cors_origin.starts_with("http://") && !args.cors_origin.starts_with("https://") {
            bail!("--cors-origin must be an http(s) origin, got {}", args.cors_origin);
        }

        Ok(Self {
            host: args.host,
            port: args.port,
            cors_origin: args.cors_origin.trim_end_matches('/').to_string(),
            width: args.stream_width,
            height: args.stream_height,
            jpeg_quality: args.jpeg_quality as u8,
            interval: Duration::from_millis(args.stream_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        capture: CaptureArgs,
        #[command(flatten)]
        stream: StreamArgs,
    }

    fn parse(args: &[&str]) -> Harness {
        Harness::try_parse_from(std::iter::once("thumbcam").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_fixed_setup() {
        let harness = parse(&[]);
        let capture = CaptureConfig::try_from(harness.capture).unwrap();
        let stream = StreamConfig::try_from(harness.stream).unwrap();

        assert_eq!(capture.camera_uri, "0");
        assert_eq!(capture.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert!(capture.mirror);
        assert_eq!(capture.detector, DetectorOptions::default());
        assert_eq!(capture.style.point_radius, 4);

        assert_eq!(stream.host, "127.0.0.1");
        assert_eq!(stream.port, 8000);
        assert_eq!(stream.cors_origin, "http://localhost:3000");
        assert_eq!((stream.width, stream.height), (320, 240));
        assert_eq!(stream.jpeg_quality, 50);
        assert_eq!(stream.interval, Duration::from_millis(33));
    }

    #[test]
    fn every_stream_flag_is_described() {
        let help = Harness::command().render_long_help().to_string();
        for text in [
            "Address the HTTP server binds to",
            "Port the HTTP server listens on",
            "Width of the published preview frames",
            "Height of the published preview frames",
        ] {
            assert!(help.contains(text), "missing {text:?} in:\n{help}");
        }
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let harness = parse(&["--jpeg-quality", "0"]);
        assert!(StreamConfig::try_from(harness.stream).is_err());
        let harness = parse(&["--jpeg-quality", "101"]);
        assert!(StreamConfig::try_from(harness.stream).is_err());
    }

    #[test]
    fn rejects_bad_capture_values() {
        let harness = parse(&["--width", "0"]);
        assert!(CaptureConfig::try_from(harness.capture).is_err());
        let harness = parse(&["--num-hands", "0"]);
        assert!(CaptureConfig::try_from(harness.capture).is_err());
    }

    #[test]
    fn origin_is_normalised() {
        let harness = parse(&["--cors-origin", "http://localhost:5173/", "--no-mirror"]);
        let stream = StreamConfig::try_from(harness.stream).unwrap();
        assert_eq!(stream.cors_origin, "http://localhost:5173");
        let capture = CaptureConfig::try_from(harness.capture).unwrap();
        assert!(!capture.mirror);

        let harness = parse(&["--cors-origin", "localhost:3000"]);
        assert!(StreamConfig::try_from(harness.stream).is_err());
    }
}
