//! Hand observations and pose classification
//!
//! Holds the per-frame hand data handed over by the landmark detector and
//! the classifier that reduces one hand to a finger-extension vector.
//!
//! ## Landmark layout
//!
//! ```text
//!         8   12  16  20        fingertips
//!         |   |   |   |
//!    4    6   10  14  18        lower joints (3 for the thumb)
//!     \   |   |   |   |
//!      3--5---9---13--17
//!       \            /
//!        1---------0            wrist
//! ```

pub mod landmarks;
pub mod pose;

pub use landmarks::{HandFrame, HandObservation, Handedness, Landmark, LANDMARK_COUNT};
pub use pose::{classify, HandPose, Orientation, PoseVector, MAX_DIGIT};
