//! Detector seam between the capture loop and the landmark model.

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::info;

use crate::{
    bridge::{BridgeCommand, MediapipeBridge},
    landmarks::HandLandmarks,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorOptions {
    pub num_hands: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            num_hands: 2,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("hand landmark model not found at {0:?}")]
    ModelNotFound(PathBuf),
    #[error("unsupported hand landmark model {0:?} (expected .task, .pt or .ts)")]
    UnsupportedModel(PathBuf),
    #[error("TorchScript model {0:?} requires the `with-tch` feature")]
    TorchDisabled(PathBuf),
    #[error("failed to start landmark bridge {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("landmark bridge protocol error: {0}")]
    Protocol(String),
    #[error("landmark bridge exited")]
    BridgeExited,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed landmark bridge response: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "with-tch")]
    #[error(transparent)]
    Torch(#[from] tch::TchError),
}

impl DetectorError {
    /// Errors after which the backend cannot produce any further results.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DetectorError::BridgeExited | DetectorError::Io(_) | DetectorError::Spawn { .. }
        )
    }
}

/// Produces hand landmarks for a single RGB frame. Called synchronously once
/// per captured frame; hands are returned in detector order.
pub trait HandLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<HandLandmarks>, DetectorError>;

    fn backend(&self) -> &'static str;
}

impl<T: HandLandmarker + ?Sized> HandLandmarker for Box<T> {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<HandLandmarks>, DetectorError> {
        (**self).detect(image)
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    MediapipeTask,
    TorchScript,
}

impl ModelKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("task") => Some(ModelKind::MediapipeTask),
            Some("pt") | Some("ts") => Some(ModelKind::TorchScript),
            _ => None,
        }
    }
}

/// Load the landmark backend matching the model asset.
pub fn open_landmarker(
    model_path: &Path,
    options: DetectorOptions,
    bridge: &BridgeCommand,
) -> Result<Box<dyn HandLandmarker + Send>, DetectorError> {
    if !model_path.exists() {
        return Err(DetectorError::ModelNotFound(model_path.to_path_buf()));
    }
    let kind = ModelKind::from_path(model_path)
        .ok_or_else(|| DetectorError::UnsupportedModel(model_path.to_path_buf()))?;

    let landmarker: Box<dyn HandLandmarker + Send> = match kind {
        ModelKind::MediapipeTask => Box::new(MediapipeBridge::spawn(model_path, options, bridge)?),
        ModelKind::TorchScript => open_torch(model_path, options)?,
    };
    info!(
        model = %model_path.display(),
        backend = landmarker.backend(),
        num_hands = options.num_hands,
        "hand landmarker ready"
    );
    Ok(landmarker)
}

#[cfg(feature = "with-tch")]
fn open_torch(
    model_path: &Path,
    options: DetectorOptions,
) -> Result<Box<dyn HandLandmarker + Send>, DetectorError> {
    let device = tch::Device::cuda_if_available();
    Ok(Box::new(crate::torch::TorchHandLandmarker::new(
        model_path, device, options,
    )?))
}

#[cfg(not(feature = "with-tch"))]
fn open_torch(
    model_path: &Path,
    _options: DetectorOptions,
) -> Result<Box<dyn HandLandmarker + Send>, DetectorError> {
    Err(DetectorError::TorchDisabled(model_path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_kind_follows_extension() {
        assert_eq!(
            ModelKind::from_path(Path::new("hand_landmarker.task")),
            Some(ModelKind::MediapipeTask)
        );
        assert_eq!(
            ModelKind::from_path(Path::new("models/hand.pt")),
            Some(ModelKind::TorchScript)
        );
        assert_eq!(ModelKind::from_path(Path::new("hand.onnx")), None);
    }

    #[test]
    fn missing_model_is_fatal() {
        let err = open_landmarker(
            Path::new("does/not/exist.task"),
            DetectorOptions::default(),
            &BridgeCommand::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }

    #[test]
    fn lost_backend_is_fatal() {
        assert!(DetectorError::BridgeExited.is_fatal());
        let broken = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(DetectorError::Io(broken).is_fatal());
        assert!(!DetectorError::Protocol("short reply".into()).is_fatal());
    }

    #[test]
    fn defaults_match_two_hand_tracking() {
        let options = DetectorOptions::default();
        assert_eq!(options.num_hands, 2);
        assert_eq!(options.min_detection_confidence, 0.5);
        assert_eq!(options.min_tracking_confidence, 0.5);
    }
}
