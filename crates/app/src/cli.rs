use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::vision::{self, CaptureArgs, DisplayArgs, StreamArgs};

#[derive(Debug, Parser)]
#[command(
    name = "thumbcam",
    version,
    about = "Classify thumb gestures from a webcam feed"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the annotated feed in a local window; press q to quit.
    Window {
        #[command(flatten)]
        capture: CaptureArgs,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Serve the current gesture and an MJPEG preview over HTTP.
    Serve {
        #[command(flatten)]
        capture: CaptureArgs,
        #[command(flatten)]
        stream: StreamArgs,
        /// Also open the local preview window.
        #[arg(long)]
        preview: bool,
        #[command(flatten)]
        display: DisplayArgs,
    },
}

pub fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Window { capture, display } => {
            vision::run_window(capture.try_into()?, display.into())
        }
        Command::Serve {
            capture,
            stream,
            preview,
            display,
        } => vision::run_serve(
            capture.try_into()?,
            stream.try_into()?,
            preview.then(|| display.into()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_uses_defaults() {
        let cli = Cli::try_parse_from(["thumbcam", "window"]).unwrap();
        match cli.command {
            Command::Window { capture, display } => {
                assert_eq!(capture.camera_uri, "0");
                assert!(!capture.no_mirror);
                assert_eq!(display.emoji_font.to_str(), Some("seguiemj.ttf"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_preview_and_stream_flags() {
        let cli = Cli::try_parse_from([
            "thumbcam",
            "serve",
            "--preview",
            "--port",
            "9000",
            "--no-mirror",
        ])
        .unwrap();
        match cli.command {
            Command::Serve {
                capture,
                stream,
                preview,
                ..
            } => {
                assert!(preview);
                assert!(capture.no_mirror);
                assert_eq!(stream.port, 9000);
                assert_eq!(stream.jpeg_quality, 50);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_flags_are_rejected_by_window() {
        assert!(Cli::try_parse_from(["thumbcam", "window", "--port", "9000"]).is_err());
    }
}
