//! TorchScript export of the MediaPipe hand landmark regressor.
//!
//! The module takes a `[1, 3, 224, 224]` float image and returns either the
//! raw `[1, 63]` landmark tensor (x, y, z in input pixels) or a tuple whose
//! second element is the hand presence score.

use std::path::Path;

use image::{RgbImage, imageops};
use tch::{self, Device, IValue, Kind, Tensor};

use crate::{
    detector::{DetectorError, DetectorOptions, HandLandmarker},
    landmarks::{HandLandmarks, LANDMARK_COUNT, Landmark},
};

const INPUT_SIZE: u32 = 224;

pub struct TorchHandLandmarker {
    module: tch::CModule,
    device: Device,
    presence_threshold: f32,
}

impl TorchHandLandmarker {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        device: Device,
        options: DetectorOptions,
    ) -> Result<Self, DetectorError> {
        let module = tch::CModule::load_on_device(model_path, device)?;
        Ok(Self {
            module,
            device,
            presence_threshold: options.min_detection_confidence,
        })
    }

    fn input_tensor(&self, image: &RgbImage) -> Tensor {
        let resized = imageops::resize(
            image,
            INPUT_SIZE,
            INPUT_SIZE,
            imageops::FilterType::Triangle,
        );
        let side = INPUT_SIZE as i64;
        Tensor::from_slice(resized.as_raw())
            .to_device(self.device)
            .to_kind(Kind::Float)
            .view([1, side, side, 3])
            .permute([0, 3, 1, 2])
            / 255.0
    }
}

impl HandLandmarker for TorchHandLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<HandLandmarks>, DetectorError> {
        let input = self.input_tensor(image);
        let output = self.module.forward_is(&[IValue::Tensor(input)])?;

        let (landmarks, presence) = match output {
            IValue::Tensor(landmarks) => (landmarks, None),
            IValue::Tuple(mut values) if values.len() >= 2 => {
                let presence = match values.remove(1) {
                    IValue::Tensor(score) => Some(score),
                    _ => None,
                };
                match values.remove(0) {
                    IValue::Tensor(landmarks) => (landmarks, presence),
                    other => {
                        return Err(DetectorError::Protocol(format!(
                            "unexpected landmark output {other:?}"
                        )));
                    }
                }
            }
            other => {
                return Err(DetectorError::Protocol(format!(
                    "unexpected landmark model output {other:?}"
                )));
            }
        };

        let score = match presence {
            Some(score) => score
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .flatten(0, -1)
                .f_double_value(&[0])? as f32,
            None => 1.0,
        };
        if score < self.presence_threshold {
            return Ok(Vec::new());
        }

        let values: Vec<f32> = Vec::<f32>::try_from(
            landmarks
                .to_device(Device::Cpu)
                .to_kind(Kind::Float)
                .flatten(0, -1),
        )?;
        if values.len() < LANDMARK_COUNT * 3 {
            return Err(DetectorError::Protocol(format!(
                "landmark output has {} values, expected {}",
                values.len(),
                LANDMARK_COUNT * 3
            )));
        }

        let scale = INPUT_SIZE as f32;
        let points: Vec<Landmark> = values
            .chunks_exact(3)
            .take(LANDMARK_COUNT)
            .map(|xyz| Landmark {
                x: xyz[0] / scale,
                y: xyz[1] / scale,
                z: xyz[2] / scale,
            })
            .collect();
        let hand = HandLandmarks::from_points(&points)
            .map_err(|err| DetectorError::Protocol(err.to_string()))?
            .with_score(score);
        Ok(vec![hand])
    }

    fn backend(&self) -> &'static str {
        "torchscript"
    }
}
