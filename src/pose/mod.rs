//! Body-joint primitives fed by the pose detector.
//!
//! Frames arrive as [`JointSample`]s with normalized coordinates (origin
//! top-left, y grows downward). They are confidence-filtered, smoothed by
//! [`JointSmoother`], and turned into joint angles with [`joint_angle`].

mod angle;
mod joints;
mod smoother;

pub use angle::joint_angle;
pub use joints::{JointName, JointObservation, JointSample, Point, Side, SmoothedJoints};
pub use smoother::JointSmoother;

/// Observations below this confidence are treated as missing.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.3;
