//! MediaPipe-style 21 point hand model.

use thiserror::Error;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Skeleton edges drawn between landmarks.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC),
    (THUMB_CMC, THUMB_MCP),
    (THUMB_MCP, THUMB_IP),
    (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP),
    (INDEX_MCP, INDEX_PIP),
    (INDEX_PIP, INDEX_DIP),
    (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP),
    (MIDDLE_MCP, MIDDLE_PIP),
    (MIDDLE_PIP, MIDDLE_DIP),
    (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP),
    (RING_MCP, RING_PIP),
    (RING_PIP, RING_DIP),
    (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP),
    (PINKY_MCP, PINKY_PIP),
    (PINKY_PIP, PINKY_DIP),
    (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

/// (tip, pip) pairs of the four non-thumb fingers.
pub const FINGER_TIP_KNUCKLES: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

/// Single keypoint. `x`/`y` are normalized to the frame size, image y grows downward.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Scale into pixel coordinates, truncating toward zero.
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        (
            (self.x * width as f32) as i32,
            (self.y * height as f32) as i32,
        )
    }
}

#[derive(Debug, Error)]
#[error("hand landmark set needs {LANDMARK_COUNT} points, got {0}")]
pub struct LandmarkCountError(pub usize);

/// One detected hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    pub points: [Landmark; LANDMARK_COUNT],
    /// Backend confidence: the handedness score from MediaPipe, the presence
    /// score from TorchScript.
    pub score: f32,
    pub handedness: Option<String>,
}

impl HandLandmarks {
    pub fn new(points: [Landmark; LANDMARK_COUNT]) -> Self {
        Self {
            points,
            score: 1.0,
            handedness: None,
        }
    }

    pub fn from_points(points: &[Landmark]) -> Result<Self, LandmarkCountError> {
        let points: [Landmark; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| LandmarkCountError(points.len()))?;
        Ok(Self::new(points))
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    /// Iterate the skeleton edges as pairs of landmarks.
    pub fn connections(&self) -> impl Iterator<Item = (&Landmark, &Landmark)> + '_ {
        HAND_CONNECTIONS
            .iter()
            .map(|&(start, end)| (&self.points[start], &self.points[end]))
    }
}

impl std::ops::Index<usize> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_requires_exactly_21() {
        let short = vec![Landmark::default(); 20];
        let err = HandLandmarks::from_points(&short).unwrap_err();
        assert_eq!(err.0, 20);

        let full = vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT];
        let hand = HandLandmarks::from_points(&full).unwrap();
        assert_eq!(hand[THUMB_TIP], Landmark::new(0.5, 0.5));
    }

    #[test]
    fn pixel_mapping_truncates() {
        let lm = Landmark::new(0.999, 0.5);
        assert_eq!(lm.to_pixel(640, 480), (639, 240));
    }

    #[test]
    fn skeleton_stays_in_range() {
        assert!(
            HAND_CONNECTIONS
                .iter()
                .all(|&(a, b)| a < LANDMARK_COUNT && b < LANDMARK_COUNT)
        );
        let hand = HandLandmarks::new([Landmark::default(); LANDMARK_COUNT]);
        assert_eq!(hand.connections().count(), HAND_CONNECTIONS.len());
    }
}
