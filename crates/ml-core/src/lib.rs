//! Hand landmark primitives shared by the capture pipeline: the 21-point hand
//! model, the thumb gesture classifier, and the detector backends producing
//! landmarks from RGB frames.

pub mod bridge;
pub mod detector;
pub mod gesture;
pub mod landmarks;
#[cfg(feature = "with-tch")]
pub mod torch;

pub use bridge::{BridgeCommand, MediapipeBridge};
pub use detector::{DetectorError, DetectorOptions, HandLandmarker, open_landmarker};
pub use gesture::{Gesture, classify, first_match};
pub use landmarks::{HAND_CONNECTIONS, HandLandmarks, LANDMARK_COUNT, Landmark};

#[cfg(feature = "with-tch")]
pub use tch;
