//! Finger-extension classification
//!
//! Reduces one hand's landmarks to a five-finger up/down vector. The thumb is
//! tested horizontally (its direction depends on which way the palm faces in
//! the mirrored frame), the other four fingers vertically.

use super::landmarks::{
    HandObservation, Handedness, Landmark, FINGER_JOINTS, FINGER_TIPS, INDEX_TIP, LANDMARK_COUNT,
    THUMB_IP, THUMB_TIP, WRIST,
};
use serde::{Deserialize, Serialize};

/// Largest digit a single classification reports
pub const MAX_DIGIT: u8 = 9;

/// Thumb orientation hint
///
/// `Left` treats the thumb as extended when its tip lies to the right of its
/// lower joint in image coordinates; `Right` when it lies to the left. In a
/// mirrored selfie view this matches a left/right hand with the palm toward
/// the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Left,
    #[default]
    Right,
}

impl From<Handedness> for Orientation {
    fn from(handedness: Handedness) -> Self {
        match handedness {
            Handedness::Left => Orientation::Left,
            Handedness::Right => Orientation::Right,
        }
    }
}

/// Finger-extension vector: thumb, index, middle, ring, pinky
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PoseVector(pub [bool; 5]);

impl PoseVector {
    pub const FIST: PoseVector = PoseVector([false; 5]);
    pub const OPEN: PoseVector = PoseVector([true; 5]);
    pub const INDEX: PoseVector = PoseVector([false, true, false, false, false]);
    pub const INDEX_MIDDLE: PoseVector = PoseVector([false, true, true, false, false]);

    pub fn fingers(&self) -> [bool; 5] {
        self.0
    }

    /// Number of extended fingers, clamped to [`MAX_DIGIT`]
    pub fn digit(&self) -> u8 {
        let count = self.0.iter().filter(|&&up| up).count() as u8;
        count.min(MAX_DIGIT)
    }

    /// Named pose, if this vector is one the state machines react to
    pub fn pose(&self) -> HandPose {
        match *self {
            Self::INDEX => HandPose::Draw,
            Self::INDEX_MIDDLE => HandPose::Confirm,
            Self::OPEN => HandPose::OpenHand,
            Self::FIST => HandPose::Fist,
            _ => HandPose::Other,
        }
    }
}

/// Poses with meaning to the input state machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandPose {
    /// Index finger only
    Draw,
    /// Index and middle fingers only
    Confirm,
    /// All five fingers extended
    OpenHand,
    /// No finger extended
    Fist,
    Other,
}

/// Classify one hand
///
/// Returns `None` when the observation is missing landmarks.
pub fn classify(hand: &HandObservation, orientation: Orientation) -> Option<PoseVector> {
    if !hand.is_complete() {
        return None;
    }

    let lm = &hand.landmarks;
    let mut fingers = [false; 5];

    let (tip, joint) = (lm[THUMB_TIP].x, lm[THUMB_IP].x);
    fingers[0] = match orientation {
        Orientation::Left => tip > joint,
        Orientation::Right => tip < joint,
    };

    for finger in 1..5 {
        fingers[finger] = lm[FINGER_TIPS[finger]].y < lm[FINGER_JOINTS[finger]].y;
    }

    Some(PoseVector(fingers))
}

/// Horizontal offsets of the four finger columns from the wrist
const FINGER_COLUMNS: [f32; 5] = [-40.0, -30.0, -10.0, 10.0, 30.0];

impl HandObservation {
    /// Build a synthetic hand that classifies as `pose` under `orientation`
    ///
    /// Used for replay fixtures and tests; the geometry is a rough upright
    /// hand with the wrist at `wrist`.
    pub fn posed(pose: PoseVector, wrist: (f32, f32), orientation: Orientation) -> Self {
        let (wx, wy) = wrist;
        let mut landmarks = vec![Landmark::new(wx, wy - 40.0); LANDMARK_COUNT];
        landmarks[WRIST] = Landmark::new(wx, wy);

        let thumb_joint = Landmark::new(wx + FINGER_COLUMNS[0], wy - 60.0);
        let thumb_out = match orientation {
            Orientation::Left => 30.0,
            Orientation::Right => -30.0,
        };
        let thumb_dx = if pose.0[0] { thumb_out } else { -thumb_out };
        landmarks[THUMB_IP] = thumb_joint;
        landmarks[THUMB_TIP] = Landmark::new(thumb_joint.x + thumb_dx, thumb_joint.y);

        for finger in 1..5 {
            let x = wx + FINGER_COLUMNS[finger];
            landmarks[FINGER_JOINTS[finger]] = Landmark::new(x, wy - 100.0);
            let tip_y = if pose.0[finger] { wy - 160.0 } else { wy - 60.0 };
            landmarks[FINGER_TIPS[finger]] = Landmark::new(x, tip_y);
        }

        Self::new(landmarks)
    }

    /// Like [`HandObservation::posed`] but positioned by the index fingertip
    pub fn posed_at_index_tip(
        pose: PoseVector,
        index_tip: (f32, f32),
        orientation: Orientation,
    ) -> Self {
        let tip_above_wrist = if pose.0[1] { 160.0 } else { 60.0 };
        let wrist = (
            index_tip.0 - FINGER_COLUMNS[1],
            index_tip.1 + tip_above_wrist,
        );
        let mut hand = Self::posed(pose, wrist, orientation);
        hand.landmarks[INDEX_TIP] = Landmark::new(index_tip.0, index_tip.1);
        hand
    }
}
