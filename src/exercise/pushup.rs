use serde::{Deserialize, Serialize};

use super::{ExerciseKind, Feedback, Reading, RepClassifier, Step};
use crate::pose::{joint_angle, Side, SmoothedJoints};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PushupState {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushupThresholds {
    /// Elbow angle (shoulder–elbow–wrist) that enters `Down`.
    pub down_below: f64,
    /// Elbow angle that returns to `Up`.
    pub up_above: f64,
    /// Required shoulder travel in normalized screen heights.
    pub min_displacement: f64,
}

impl Default for PushupThresholds {
    fn default() -> Self {
        Self {
            down_below: 90.0,
            up_above: 160.0,
            min_displacement: 0.05,
        }
    }
}

/// Up ↔ Down on the elbow angle, with a displacement guard: the shoulder
/// must actually travel downward (y grows) by `min_displacement` between
/// entering `Down` and returning `Up`, or the rep is rejected.
#[derive(Debug, Clone)]
pub struct PushupClassifier {
    state: PushupState,
    baseline_y: f64,
    lowest_y: f64,
    thresholds: PushupThresholds,
}

impl PushupClassifier {
    pub fn new(thresholds: PushupThresholds) -> Self {
        Self {
            state: PushupState::Up,
            baseline_y: 0.0,
            lowest_y: 0.0,
            thresholds,
        }
    }

    pub fn state(&self) -> PushupState {
        self.state
    }

    /// Shoulder travel recorded since entering `Down`.
    pub fn displacement(&self) -> f64 {
        self.lowest_y - self.baseline_y
    }

    pub fn step(&mut self, angle: f64, shoulder_y: f64) -> Step {
        let t = self.thresholds;
        match self.state {
            PushupState::Up => {
                if angle < t.down_below {
                    self.state = PushupState::Down;
                    self.baseline_y = shoulder_y;
                    self.lowest_y = shoulder_y;
                    Step::prompt(Feedback::Push)
                } else {
                    Step::prompt(Feedback::GoDown)
                }
            }
            PushupState::Down => {
                if shoulder_y > self.lowest_y {
                    self.lowest_y = shoulder_y;
                }

                if angle > t.up_above {
                    self.state = PushupState::Up;
                    if self.displacement() > t.min_displacement {
                        Step::rep()
                    } else {
                        Step::prompt(Feedback::GoLower)
                    }
                } else {
                    Step::prompt(Feedback::PushUp)
                }
            }
        }
    }
}

impl Default for PushupClassifier {
    fn default() -> Self {
        Self::new(PushupThresholds::default())
    }
}

impl RepClassifier for PushupClassifier {
    fn kind(&self) -> ExerciseKind {
        ExerciseKind::Pushup
    }

    fn observe(&mut self, joints: &SmoothedJoints) -> Option<Reading> {
        let [shoulder, elbow, wrist] = Side::SEARCH_ORDER.iter().find_map(|side| {
            let [shoulder, elbow, wrist] = side.arm();
            Some([
                *joints.get(&shoulder)?,
                *joints.get(&elbow)?,
                *joints.get(&wrist)?,
            ])
        })?;

        let angle = joint_angle(shoulder, elbow, wrist);
        Some(Reading {
            angle,
            step: self.step(angle, shoulder.y),
        })
    }

    fn phase(&self) -> &'static str {
        match self.state {
            PushupState::Up => "up",
            PushupState::Down => "down",
        }
    }

    fn reset(&mut self) {
        self.state = PushupState::Up;
        self.baseline_y = 0.0;
        self.lowest_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same elbow angles every time; only the shoulder travel differs.
    fn cycle(pushup: &mut PushupClassifier, travel: f64) -> Step {
        let top = 0.40;
        pushup.step(170.0, top);
        pushup.step(80.0, top);
        pushup.step(70.0, top + travel);
        pushup.step(85.0, top + travel / 2.0);
        pushup.step(170.0, top)
    }

    #[test]
    fn shallow_rep_is_rejected() {
        let mut pushup = PushupClassifier::default();
        let last = cycle(&mut pushup, 0.02);
        assert!(!last.counted);
        assert_eq!(last.feedback, Some(Feedback::GoLower));
        assert_eq!(pushup.state(), PushupState::Up);
    }

    #[test]
    fn deep_rep_counts() {
        let mut pushup = PushupClassifier::default();
        let last = cycle(&mut pushup, 0.10);
        assert!(last.counted);
        assert_eq!(pushup.state(), PushupState::Up);
    }

    #[test]
    fn rejected_rep_does_not_poison_the_next() {
        let mut pushup = PushupClassifier::default();
        assert!(!cycle(&mut pushup, 0.01).counted);
        assert!(cycle(&mut pushup, 0.12).counted);
    }

    #[test]
    fn baseline_resets_on_each_descent() {
        let mut pushup = PushupClassifier::default();
        cycle(&mut pushup, 0.10);
        pushup.step(80.0, 0.55);
        assert_eq!(pushup.displacement(), 0.0);
    }
}
