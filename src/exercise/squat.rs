use serde::{Deserialize, Serialize};

use super::{ExerciseKind, Feedback, Reading, RepClassifier, Step};
use crate::pose::{joint_angle, Side, SmoothedJoints};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SquatState {
    Idle,
    Descending,
    Bottom,
    Ascending,
}

/// Knee angle thresholds in degrees. The gap between `descend_below` and
/// `standing_above` is the hysteresis band that keeps a resting user in
/// `Idle`. Ordering must hold: bottom < ascend < descend < standing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquatThresholds {
    pub standing_above: f64,
    pub descend_below: f64,
    pub bottom_below: f64,
    pub ascend_above: f64,
}

impl Default for SquatThresholds {
    fn default() -> Self {
        Self {
            standing_above: 160.0,
            descend_below: 150.0,
            bottom_below: 100.0,
            ascend_above: 120.0,
        }
    }
}

/// Idle → Descending → Bottom → Ascending → Idle (counted).
#[derive(Debug, Clone)]
pub struct SquatClassifier {
    state: SquatState,
    rep_ready: bool,
    thresholds: SquatThresholds,
}

impl SquatClassifier {
    pub fn new(thresholds: SquatThresholds) -> Self {
        Self {
            state: SquatState::Idle,
            rep_ready: false,
            thresholds,
        }
    }

    pub fn state(&self) -> SquatState {
        self.state
    }

    /// Advance on one knee angle (hip–knee–ankle).
    pub fn step(&mut self, angle: f64) -> Step {
        let t = self.thresholds;
        match self.state {
            SquatState::Idle => {
                if angle > t.standing_above {
                    self.rep_ready = false;
                    Step::prompt(Feedback::SquatDown)
                } else if angle < t.descend_below {
                    self.state = SquatState::Descending;
                    Step::prompt(Feedback::GoingDown)
                } else {
                    Step::default()
                }
            }
            SquatState::Descending => {
                if angle < t.bottom_below {
                    self.state = SquatState::Bottom;
                    self.rep_ready = true;
                    Step::prompt(Feedback::Hold)
                } else if angle > t.standing_above {
                    // Aborted before reaching depth.
                    self.state = SquatState::Idle;
                    Step::prompt(Feedback::SquatDown)
                } else {
                    Step::default()
                }
            }
            SquatState::Bottom => {
                if angle > t.ascend_above {
                    self.state = SquatState::Ascending;
                    Step::prompt(Feedback::PushUp)
                } else {
                    Step::default()
                }
            }
            SquatState::Ascending => {
                if angle > t.standing_above {
                    self.state = SquatState::Idle;
                    if self.rep_ready {
                        self.rep_ready = false;
                        Step::rep()
                    } else {
                        Step::prompt(Feedback::SquatDown)
                    }
                } else {
                    if angle < t.bottom_below {
                        // False ascent.
                        self.state = SquatState::Bottom;
                    }
                    Step::default()
                }
            }
        }
    }
}

impl Default for SquatClassifier {
    fn default() -> Self {
        Self::new(SquatThresholds::default())
    }
}

impl RepClassifier for SquatClassifier {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Squat
    }

    fn observe(&mut self, joints: &SmoothedJoints) -> Option<Reading> {
        let [hip, knee, ankle] = Side::SEARCH_ORDER.iter().find_map(|side| {
            let [hip, knee, ankle] = side.leg();
            Some([*joints.get(&hip)?, *joints.get(&knee)?, *joints.get(&ankle)?])
        })?;

        let angle = joint_angle(hip, knee, ankle);
        Some(Reading {
            angle,
            step: self.step(angle),
        })
    }

    fn phase(&self) -> &'static str {
        match self.state {
            SquatState::Idle => "idle",
            SquatState::Descending => "descending",
            SquatState::Bottom => "bottom",
            SquatState::Ascending => "ascending",
        }
    }

    fn reset(&mut self) {
        self.state = SquatState::Idle;
        self.rep_ready = false;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::pose::{JointName, Point};

    fn run(classifier: &mut SquatClassifier, angles: &[f64]) -> u32 {
        angles
            .iter()
            .filter(|angle| classifier.step(**angle).counted)
            .count() as u32
    }

    #[test]
    fn full_squat_counts_once() {
        let mut squat = SquatClassifier::default();
        assert_eq!(run(&mut squat, &[170.0, 140.0, 90.0, 130.0, 170.0]), 1);
        assert_eq!(squat.state(), SquatState::Idle);
    }

    #[test]
    fn shallow_dip_stays_idle() {
        let mut squat = SquatClassifier::default();
        for angle in [170.0, 155.0, 158.0, 152.0, 170.0] {
            assert!(!squat.step(angle).counted);
            assert_eq!(squat.state(), SquatState::Idle);
        }
    }

    #[test]
    fn aborted_descent_does_not_count() {
        let mut squat = SquatClassifier::default();
        assert_eq!(run(&mut squat, &[170.0, 140.0, 120.0, 165.0]), 0);
        assert_eq!(squat.state(), SquatState::Idle);
    }

    #[test]
    fn false_ascent_returns_to_bottom() {
        let mut squat = SquatClassifier::default();
        run(&mut squat, &[170.0, 140.0, 90.0, 125.0]);
        assert_eq!(squat.state(), SquatState::Ascending);
        squat.step(95.0);
        assert_eq!(squat.state(), SquatState::Bottom);
        assert_eq!(run(&mut squat, &[130.0, 170.0]), 1);
    }

    #[test]
    fn consecutive_reps() {
        let mut squat = SquatClassifier::default();
        let rep = [140.0, 90.0, 130.0, 170.0];
        let angles: Vec<f64> = rep.iter().cycle().take(rep.len() * 3).copied().collect();
        assert_eq!(run(&mut squat, &angles), 3);
    }

    #[test]
    fn nan_angle_is_ignored() {
        let mut squat = SquatClassifier::default();
        squat.step(140.0);
        assert_eq!(squat.step(f64::NAN), Step::default());
        assert_eq!(squat.state(), SquatState::Descending);
    }

    #[test]
    fn falls_back_to_left_leg() {
        let mut squat = SquatClassifier::default();
        let joints: SmoothedJoints = HashMap::from([
            (JointName::LeftHip, Point::new(0.5, 0.3)),
            (JointName::LeftKnee, Point::new(0.5, 0.5)),
            (JointName::LeftAnkle, Point::new(0.5, 0.7)),
            (JointName::RightHip, Point::new(0.6, 0.3)),
        ]);

        let reading = squat.observe(&joints).expect("left leg is complete");
        assert!((reading.angle - 180.0).abs() < 1e-6);
    }

    #[test]
    fn incomplete_legs_skip_the_frame() {
        let mut squat = SquatClassifier::default();
        let joints: SmoothedJoints = HashMap::from([
            (JointName::LeftHip, Point::new(0.5, 0.3)),
            (JointName::RightKnee, Point::new(0.5, 0.5)),
        ]);
        assert!(squat.observe(&joints).is_none());
        assert_eq!(squat.state(), SquatState::Idle);
    }
}
