use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Normalized 2D image point, `x`/`y` in `[0, 1]`, origin top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JointName {
    Nose,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Preferred side first.
    pub const SEARCH_ORDER: [Side; 2] = [Side::Right, Side::Left];

    /// Hip, knee, ankle.
    pub fn leg(self) -> [JointName; 3] {
        match self {
            Side::Left => [JointName::LeftHip, JointName::LeftKnee, JointName::LeftAnkle],
            Side::Right => [JointName::RightHip, JointName::RightKnee, JointName::RightAnkle],
        }
    }

    /// Shoulder, elbow, wrist.
    pub fn arm(self) -> [JointName; 3] {
        match self {
            Side::Left => [
                JointName::LeftShoulder,
                JointName::LeftElbow,
                JointName::LeftWrist,
            ],
            Side::Right => [
                JointName::RightShoulder,
                JointName::RightElbow,
                JointName::RightWrist,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointObservation {
    pub point: Point,
    pub confidence: f32,
}

/// One camera frame worth of detected joints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    pub joints: HashMap<JointName, JointObservation>,
}

/// Smoothed output keyed by joint. A missing key means the joint was not
/// observed this frame.
pub type SmoothedJoints = HashMap<JointName, Point>;

impl JointSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, joint: JointName, x: f64, y: f64, confidence: f32) -> Self {
        self.insert(joint, Point::new(x, y), confidence);
        self
    }

    pub fn insert(&mut self, joint: JointName, point: Point, confidence: f32) {
        self.joints.insert(joint, JointObservation { point, confidence });
    }

    pub fn get(&self, joint: JointName) -> Option<&JointObservation> {
        self.joints.get(&joint)
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Points whose confidence reaches `min_confidence`; the rest are dropped.
    pub fn confident(&self, min_confidence: f32) -> SmoothedJoints {
        self.joints
            .iter()
            .filter(|(_, obs)| obs.confidence >= min_confidence)
            .map(|(joint, obs)| (*joint, obs.point))
            .collect()
    }
}
