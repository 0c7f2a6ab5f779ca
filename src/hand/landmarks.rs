//! Landmark data model
//!
//! One detected hand is 21 ordered landmarks in pixel coordinates. Frames
//! arrive with zero, one or two hands and a session-relative timestamp.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of landmarks per hand
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// Fingertip indices, thumb first
pub const FINGER_TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Lower joint compared against each fingertip
pub const FINGER_JOINTS: [usize; 5] = [THUMB_IP, INDEX_PIP, MIDDLE_PIP, RING_PIP, PINKY_PIP];

/// A single landmark position
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the wrist; unused by the classifier
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn point(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// Which hand the detector believes it saw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand in one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    pub landmarks: Vec<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
}

impl HandObservation {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            landmarks,
            handedness: None,
        }
    }

    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = Some(handedness);
        self
    }

    /// Whether all 21 landmarks are present
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }

    /// Landmark at `index`, if present
    pub fn landmark(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn wrist(&self) -> Option<(f32, f32)> {
        self.landmark(WRIST).map(Landmark::point)
    }

    pub fn index_tip(&self) -> Option<(f32, f32)> {
        self.landmark(INDEX_TIP).map(Landmark::point)
    }

    /// Scale normalized (0..1) coordinates to pixels
    pub fn scaled(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            landmarks: self
                .landmarks
                .iter()
                .map(|l| Landmark {
                    x: l.x * w,
                    y: l.y * h,
                    z: l.z,
                })
                .collect(),
            handedness: self.handedness,
        }
    }
}

/// All hands detected in one video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandFrame {
    /// Milliseconds since the start of the session
    #[serde(rename = "t_ms")]
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hands: Vec<HandObservation>,
}

impl HandFrame {
    pub fn new(timestamp_ms: u64, hands: Vec<HandObservation>) -> Self {
        Self {
            timestamp_ms,
            hands,
        }
    }

    pub fn empty(timestamp_ms: u64) -> Self {
        Self::new(timestamp_ms, Vec::new())
    }

    pub fn timestamp(&self) -> Duration {
        Duration::from_millis(self.timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_observation() {
        let obs = HandObservation::new(vec![Landmark::new(1.0, 2.0); 20]);
        assert!(!obs.is_complete());
        assert_eq!(obs.wrist(), Some((1.0, 2.0)));
        assert_eq!(obs.index_tip(), Some((1.0, 2.0)));
    }

    #[test]
    fn test_scaled_observation() {
        let obs = HandObservation::new(vec![Landmark::new(0.5, 0.25); LANDMARK_COUNT])
            .with_handedness(Handedness::Left);
        let scaled = obs.scaled(1280, 720);
        assert_eq!(scaled.wrist(), Some((640.0, 180.0)));
        assert_eq!(scaled.handedness, Some(Handedness::Left));
    }

    #[test]
    fn test_frame_deserialisation() {
        let json = r#"{"t_ms": 1500, "hands": [{"handedness": "right", "landmarks": [{"x": 1, "y": 2}]}]}"#;
        let frame: HandFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.timestamp(), Duration::from_millis(1500));
        assert_eq!(frame.hands.len(), 1);
        assert_eq!(frame.hands[0].handedness, Some(Handedness::Right));
        assert_eq!(frame.hands[0].landmarks[0].z, 0.0);
    }

    #[test]
    fn test_frame_without_hands() {
        let frame: HandFrame = serde_json::from_str(r#"{"t_ms": 0}"#).unwrap();
        assert!(frame.hands.is_empty());
    }
}
