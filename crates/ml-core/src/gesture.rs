//! Thumb direction classifier.
//!
//! A hand only qualifies when every non-thumb finger is curled (tip not above
//! its PIP knuckle). The thumb vector from its MCP joint to its tip is then
//! bucketed by angle, with 0° pointing right and 90° pointing up in image
//! space.

use std::fmt;

use serde::Serialize;

use crate::landmarks::{FINGER_TIP_KNUCKLES, HandLandmarks, THUMB_MCP, THUMB_TIP};

/// Bucket boundary in degrees. The boundary itself belongs to [`Gesture::Okay`].
pub const DIRECTION_THRESHOLD_DEG: f64 = 45.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gesture {
    Happy,
    Sad,
    Okay,
}

impl Gesture {
    pub const ALL: [Gesture; 3] = [Gesture::Happy, Gesture::Sad, Gesture::Okay];

    pub fn label(self) -> &'static str {
        match self {
            Gesture::Happy => "happy",
            Gesture::Sad => "sad",
            Gesture::Okay => "okay",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Gesture::Happy => "\u{1F60A}",
            Gesture::Sad => "\u{1F622}",
            Gesture::Okay => "\u{1F610}",
        }
    }

    /// Face drawn when no emoji capable font is available.
    pub fn ascii_face(self) -> &'static str {
        match self {
            Gesture::Happy => ":)",
            Gesture::Sad => ":(",
            Gesture::Okay => ":|",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// True when no fingertip sits strictly above its knuckle.
pub fn fingers_curled(hand: &HandLandmarks) -> bool {
    FINGER_TIP_KNUCKLES
        .iter()
        .all(|&(tip, pip)| hand[tip].y >= hand[pip].y)
}

/// Angle of the thumb MCP → tip vector, y flipped to point up.
///
/// Landmarks are widened to `f64` before subtracting; in `f32` near-diagonal
/// thumbs round onto the 45° boundary and change bucket.
pub fn thumb_angle_degrees(hand: &HandLandmarks) -> f64 {
    let tip = hand[THUMB_TIP];
    let base = hand[THUMB_MCP];
    let dx = f64::from(tip.x) - f64::from(base.x);
    let dy = f64::from(tip.y) - f64::from(base.y);
    (-dy).atan2(dx).to_degrees()
}

pub fn gesture_for_angle(angle: f64) -> Gesture {
    if angle > DIRECTION_THRESHOLD_DEG {
        Gesture::Happy
    } else if angle < -DIRECTION_THRESHOLD_DEG {
        Gesture::Sad
    } else {
        Gesture::Okay
    }
}

pub fn classify(hand: &HandLandmarks) -> Option<Gesture> {
    if !fingers_curled(hand) {
        return None;
    }
    Some(gesture_for_angle(thumb_angle_degrees(hand)))
}

/// Classify hands in detector order and keep the first that matches.
pub fn first_match<'a, I>(hands: I) -> Option<Gesture>
where
    I: IntoIterator<Item = &'a HandLandmarks>,
{
    hands.into_iter().find_map(classify)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{INDEX_PIP, INDEX_TIP, LANDMARK_COUNT, Landmark};

    /// Fist with every non-thumb fingertip below its knuckle and the thumb
    /// running from `base` to `tip`.
    fn fist(base: (f32, f32), tip: (f32, f32)) -> HandLandmarks {
        let mut points = [Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        for (tip_idx, pip_idx) in FINGER_TIP_KNUCKLES {
            points[pip_idx] = Landmark::new(0.5, 0.55);
            points[tip_idx] = Landmark::new(0.5, 0.6);
        }
        points[THUMB_MCP] = Landmark::new(base.0, base.1);
        points[THUMB_TIP] = Landmark::new(tip.0, tip.1);
        HandLandmarks::new(points)
    }

    #[test]
    fn thumb_up_and_right_is_happy() {
        let hand = fist((0.5, 0.5), (0.6, 0.3));
        let angle = thumb_angle_degrees(&hand);
        assert!((angle - 63.43).abs() < 0.1, "angle {angle}");
        assert_eq!(classify(&hand), Some(Gesture::Happy));
    }

    #[test]
    fn extended_index_finger_blocks_classification() {
        let mut hand = fist((0.5, 0.5), (0.6, 0.3));
        hand.points[INDEX_TIP] = Landmark::new(0.5, 0.4);
        hand.points[INDEX_PIP] = Landmark::new(0.5, 0.45);
        assert_eq!(classify(&hand), None);
    }

    #[test]
    fn any_single_extended_finger_fails_the_gate() {
        for (tip, pip) in FINGER_TIP_KNUCKLES {
            let mut hand = fist((0.5, 0.5), (0.5, 0.9));
            hand.points[tip].y = hand.points[pip].y - 0.01;
            assert!(!fingers_curled(&hand));
            assert_eq!(classify(&hand), None);
        }
    }

    #[test]
    fn tip_level_with_knuckle_counts_as_curled() {
        let mut hand = fist((0.5, 0.5), (0.6, 0.5));
        for (tip, pip) in FINGER_TIP_KNUCKLES {
            hand.points[tip].y = hand.points[pip].y;
        }
        assert!(fingers_curled(&hand));
        assert_eq!(classify(&hand), Some(Gesture::Okay));
    }

    #[test]
    fn thumb_down_is_sad() {
        let hand = fist((0.5, 0.3), (0.52, 0.6));
        assert_eq!(classify(&hand), Some(Gesture::Sad));
    }

    #[test]
    fn thumb_sideways_is_okay() {
        assert_eq!(classify(&fist((0.5, 0.5), (0.7, 0.45))), Some(Gesture::Okay));
        assert_eq!(classify(&fist((0.5, 0.5), (0.7, 0.55))), Some(Gesture::Okay));
    }

    #[test]
    fn pointing_left_takes_the_sign_of_dy() {
        // Slightly above horizontal is near +180°, slightly below near -180°.
        assert_eq!(classify(&fist((0.5, 0.5), (0.3, 0.49))), Some(Gesture::Happy));
        assert_eq!(classify(&fist((0.5, 0.5), (0.3, 0.51))), Some(Gesture::Sad));
    }

    #[test]
    fn exact_boundaries_are_okay() {
        assert_eq!(gesture_for_angle(45.0), Gesture::Okay);
        assert_eq!(gesture_for_angle(-45.0), Gesture::Okay);
        assert_eq!(gesture_for_angle(45.001), Gesture::Happy);
        assert_eq!(gesture_for_angle(-45.001), Gesture::Sad);
        assert_eq!(gesture_for_angle(0.0), Gesture::Okay);
    }

    #[test]
    fn diagonal_thumb_hits_boundary() {
        // dx = 0.25, dy = -0.25 gives exactly 45°.
        let hand = fist((0.5, 0.5), (0.75, 0.25));
        assert!((thumb_angle_degrees(&hand) - 45.0).abs() < 1e-4);
        assert_eq!(classify(&hand), Some(Gesture::Okay));
    }

    #[test]
    fn near_diagonal_thumb_keeps_its_bucket() {
        // The f32 difference of these points is exactly diagonal, the f64 one
        // sits just above 45°.
        let hand = fist((0.298_898_88, 0.525_393_96), (0.596_044_4, 0.228_248_4));
        assert!(thumb_angle_degrees(&hand) > 45.0);
        assert_eq!(classify(&hand), Some(Gesture::Happy));
    }

    #[test]
    fn classification_is_repeatable() {
        let hand = fist((0.41, 0.52), (0.47, 0.31));
        let first = classify(&hand);
        assert_eq!(first, classify(&hand));
        assert_eq!(first, classify(&hand.clone()));
    }

    #[test]
    fn first_matching_hand_wins() {
        let mut open = fist((0.5, 0.5), (0.6, 0.3));
        open.points[INDEX_TIP].y = 0.1;
        let sad = fist((0.5, 0.3), (0.5, 0.7));
        let happy = fist((0.5, 0.5), (0.6, 0.3));

        assert_eq!(first_match([&open, &sad, &happy]), Some(Gesture::Sad));
        assert_eq!(first_match([&happy, &sad]), Some(Gesture::Happy));
        assert_eq!(first_match([&open]), None);
        assert_eq!(first_match(std::iter::empty()), None);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Gesture::Okay).unwrap(), "\"okay\"");
        assert_eq!(serde_json::to_string(&None::<Gesture>).unwrap(), "null");
        for gesture in Gesture::ALL {
            assert_eq!(gesture.to_string(), gesture.label());
        }
    }
}
