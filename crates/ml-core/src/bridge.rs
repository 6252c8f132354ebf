//! MediaPipe Tasks hand landmarker driven through a helper process.
//!
//! The helper loads the `.task` asset and prints `READY`. Each request is three
//! little-endian `u32` values (width, height, channels) followed by the raw RGB
//! pixels; the helper answers with one JSON line per frame.

use std::{
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use image::RgbImage;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    detector::{DetectorError, DetectorOptions, HandLandmarker},
    landmarks::{HandLandmarks, LANDMARK_COUNT, Landmark},
};

const READY_LINE: &str = "READY";

/// Interpreter and script used to host the MediaPipe runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeCommand {
    pub program: PathBuf,
    pub script: PathBuf,
}

impl Default for BridgeCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            script: PathBuf::from("scripts/hand_landmarker_bridge.py"),
        }
    }
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default = "full_score")]
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

fn full_score() -> f32 {
    1.0
}

#[derive(Deserialize, Debug)]
struct BridgeResponse {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

pub struct MediapipeBridge {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl MediapipeBridge {
    /// Start the helper and wait for its ready handshake.
    pub fn spawn(
        model_path: &Path,
        options: DetectorOptions,
        command: &BridgeCommand,
    ) -> Result<Self, DetectorError> {
        info!(
            program = %command.program.display(),
            script = %command.script.display(),
            "starting MediaPipe landmark bridge"
        );
        let mut child = Command::new(&command.program)
            .arg(&command.script)
            .arg("--model")
            .arg(model_path)
            .arg("--num-hands")
            .arg(options.num_hands.to_string())
            .arg("--min-detection-confidence")
            .arg(options.min_detection_confidence.to_string())
            .arg("--min-tracking-confidence")
            .arg(options.min_tracking_confidence.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| DetectorError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DetectorError::Protocol("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DetectorError::Protocol("bridge stdout unavailable".into()))?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        stdout.read_line(&mut ready)?;
        if ready.trim() != READY_LINE {
            let _ = child.kill();
            return Err(DetectorError::Protocol(format!(
                "expected {READY_LINE:?} handshake, got {:?}",
                ready.trim()
            )));
        }

        Ok(Self {
            child,
            stdin,
            stdout,
            line: String::new(),
        })
    }
}

impl HandLandmarker for MediapipeBridge {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<HandLandmarks>, DetectorError> {
        write_request(&mut self.stdin, image)?;

        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            return Err(DetectorError::BridgeExited);
        }
        parse_response(&self.line)
    }

    fn backend(&self) -> &'static str {
        "mediapipe-bridge"
    }
}

impl Drop for MediapipeBridge {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub(crate) fn write_request<W: Write>(writer: &mut W, image: &RgbImage) -> std::io::Result<()> {
    writer.write_all(&image.width().to_le_bytes())?;
    writer.write_all(&image.height().to_le_bytes())?;
    writer.write_all(&3u32.to_le_bytes())?;
    writer.write_all(image.as_raw())?;
    writer.flush()
}

/// Confidence filtering happens inside MediaPipe; every complete hand is kept.
pub(crate) fn parse_response(line: &str) -> Result<Vec<HandLandmarks>, DetectorError> {
    let response: BridgeResponse = serde_json::from_str(line.trim())?;
    if let Some(error) = response.error {
        warn!("landmark bridge reported: {error}");
        return Ok(Vec::new());
    }

    let mut hands = Vec::with_capacity(response.hands.len());
    for hand in response.hands {
        if hand.landmarks.len() != LANDMARK_COUNT {
            warn!(
                "expected {LANDMARK_COUNT} landmarks, got {}",
                hand.landmarks.len()
            );
            continue;
        }
        let points: Vec<Landmark> = hand
            .landmarks
            .iter()
            .map(|lm| Landmark {
                x: lm.x,
                y: lm.y,
                z: lm.z,
            })
            .collect();
        let Ok(mut parsed) = HandLandmarks::from_points(&points) else {
            continue;
        };
        parsed.score = hand.score;
        parsed.handedness = hand.handedness;
        hands.push(parsed);
    }
    Ok(hands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(score: f32, count: usize, y: f32) -> String {
        let points: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"x":{},"y":{y},"z":0.0}}"#, i as f32 / 100.0))
            .collect();
        format!(
            r#"{{"handedness":"Right","score":{score},"landmarks":[{}]}}"#,
            points.join(",")
        )
    }

    #[test]
    fn request_header_precedes_pixels() {
        let image = RgbImage::from_pixel(2, 1, image::Rgb([1, 2, 3]));
        let mut buffer = Vec::new();
        write_request(&mut buffer, &image).unwrap();

        assert_eq!(&buffer[0..4], &2u32.to_le_bytes());
        assert_eq!(&buffer[4..8], &1u32.to_le_bytes());
        assert_eq!(&buffer[8..12], &3u32.to_le_bytes());
        assert_eq!(&buffer[12..], &[1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn parses_hands_in_order() {
        let line = format!(
            r#"{{"hands":[{},{}]}}"#,
            hand_json(0.9, LANDMARK_COUNT, 0.25),
            hand_json(0.8, LANDMARK_COUNT, 0.75)
        );
        let hands = parse_response(&line).unwrap();
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].handedness.as_deref(), Some("Right"));
        assert_eq!(hands[0].score, 0.9);
        assert_eq!(hands[0][20].x, 0.2);
        assert_eq!(hands[1][0].y, 0.75);
    }

    #[test]
    fn drops_incomplete_hands_only() {
        let line = format!(
            r#"{{"hands":[{},{},{}]}}"#,
            hand_json(0.9, 20, 0.5),
            hand_json(0.3, LANDMARK_COUNT, 0.5),
            hand_json(0.6, LANDMARK_COUNT, 0.5)
        );
        let hands = parse_response(&line).unwrap();
        let scores: Vec<f32> = hands.iter().map(|hand| hand.score).collect();
        assert_eq!(scores, vec![0.3, 0.6]);
    }

    #[test]
    fn bridge_errors_yield_no_hands() {
        let hands = parse_response(r#"{"hands":[],"error":"bad frame"}"#).unwrap();
        assert!(hands.is_empty());
        let err = parse_response("not json").unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_interpreter_fails_to_spawn() {
        let command = BridgeCommand {
            program: PathBuf::from("/nonexistent/python-for-tests"),
            script: PathBuf::from("bridge.py"),
        };
        let err = MediapipeBridge::spawn(
            Path::new("hand_landmarker.task"),
            DetectorOptions::default(),
            &command,
        )
        .err()
        .unwrap();
        assert!(matches!(err, DetectorError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn exited_helper_is_fatal() {
        let script = std::env::temp_dir().join("thumbcam-bridge-exits.sh");
        std::fs::write(&script, "echo READY\n").unwrap();
        let command = BridgeCommand {
            program: PathBuf::from("sh"),
            script: script.clone(),
        };
        let mut bridge = MediapipeBridge::spawn(
            Path::new("hand_landmarker.task"),
            DetectorOptions::default(),
            &command,
        )
        .unwrap();

        let err = bridge.detect(&RgbImage::new(2, 1)).err().unwrap();
        assert!(err.is_fatal(), "{err}");
        let _ = std::fs::remove_file(&script);
    }
}
