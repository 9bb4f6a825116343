use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    ExerciseKind, Feedback, PushupClassifier, RepClassifier, SquatClassifier,
};
use crate::ledger::Target;
use crate::pose::{JointSample, JointSmoother};
use crate::settings::Settings;

/// Occasional elevated rep target, fixed when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusConfig {
    pub probability: f64,
    pub default_target: u32,
    pub bonus_target: u32,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            probability: 0.05,
            default_target: 5,
            bonus_target: 10,
        }
    }
}

impl BonusConfig {
    /// Deterministic for a given seed.
    pub fn draw(&self, seed: u64) -> SessionTarget {
        let mut rng = StdRng::seed_from_u64(seed);
        let roll: f64 = rng.gen();
        if roll < self.probability {
            SessionTarget {
                reps: self.bonus_target,
                bonus: true,
            }
        } else {
            SessionTarget {
                reps: self.default_target,
                bonus: false,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTarget {
    pub reps: u32,
    pub bonus: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ExerciseEvent {
    RepCompleted {
        session_id: String,
        kind: ExerciseKind,
        count: u32,
    },
    /// Fired once, when the count first reaches the session target.
    TargetReached {
        session_id: String,
        kind: ExerciseKind,
        count: u32,
        unlock: Option<Target>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub kind: ExerciseKind,
    pub reps: u32,
    pub target_reps: u32,
    pub bonus: bool,
    pub phase: &'static str,
    pub feedback: Feedback,
    pub angle: Option<f64>,
    pub started_at: DateTime<Utc>,
}

/// One active exercise session: its own smoother, classifier, and counter.
/// Dropping it discards all per-session state.
pub struct ExerciseSession {
    id: String,
    kind: ExerciseKind,
    target: SessionTarget,
    unlock: Option<Target>,
    started_at: DateTime<Utc>,
    min_confidence: f32,
    smoother: JointSmoother,
    classifier: Box<dyn RepClassifier>,
    reps: u32,
    feedback: Feedback,
    angle: Option<f64>,
}

impl ExerciseSession {
    pub fn new(
        kind: ExerciseKind,
        target: SessionTarget,
        unlock: Option<Target>,
        settings: &Settings,
        started_at: DateTime<Utc>,
    ) -> Self {
        let classifier: Box<dyn RepClassifier> = match kind {
            ExerciseKind::Squat => Box::new(SquatClassifier::new(settings.squat)),
            ExerciseKind::Pushup => Box::new(PushupClassifier::new(settings.pushup)),
        };
        let feedback = match (target.bonus, kind) {
            (true, _) => Feedback::BonusRound,
            (false, ExerciseKind::Squat) => Feedback::StandInFrame,
            (false, ExerciseKind::Pushup) => Feedback::GetInPosition,
        };

        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            target,
            unlock,
            started_at,
            min_confidence: settings.min_confidence,
            smoother: JointSmoother::new(settings.smoother_window),
            classifier,
            reps: 0,
            feedback,
            angle: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    pub fn target(&self) -> SessionTarget {
        self.target
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Feed one camera frame. Low-confidence joints are dropped before
    /// smoothing; a frame without the needed joints changes nothing.
    pub fn process(&mut self, sample: &JointSample) -> Vec<ExerciseEvent> {
        let confident = sample.confident(self.min_confidence);
        if confident.is_empty() {
            return Vec::new();
        }

        let smoothed = self.smoother.smooth(&confident);
        let Some(reading) = self.classifier.observe(&smoothed) else {
            return Vec::new();
        };

        self.angle = Some(reading.angle);
        if let Some(feedback) = reading.step.feedback {
            self.feedback = feedback;
        }
        if !reading.step.counted {
            return Vec::new();
        }

        self.reps += 1;
        let mut events = vec![ExerciseEvent::RepCompleted {
            session_id: self.id.clone(),
            kind: self.kind,
            count: self.reps,
        }];

        if self.reps == self.target.reps {
            self.feedback = Feedback::Unlocked;
            events.push(ExerciseEvent::TargetReached {
                session_id: self.id.clone(),
                kind: self.kind,
                count: self.reps,
                unlock: self.unlock.clone(),
            });
        }

        events
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            reps: self.reps,
            target_reps: self.target.reps,
            bonus: self.target.bonus,
            phase: self.classifier.phase(),
            feedback: self.feedback,
            angle: self.angle,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{JointName, Point};

    /// Right leg with the knee bent to roughly `degrees`.
    fn leg_frame(degrees: f64) -> JointSample {
        let knee = Point::new(0.5, 0.6);
        let rad = degrees.to_radians();
        // Ankle straight below the knee, hip swung around it.
        let ankle = Point::new(knee.x, knee.y + 0.2);
        let hip = Point::new(knee.x + 0.2 * rad.sin(), knee.y + 0.2 * rad.cos());
        JointSample::new()
            .with(JointName::RightHip, hip.x, hip.y, 0.9)
            .with(JointName::RightKnee, knee.x, knee.y, 0.9)
            .with(JointName::RightAnkle, ankle.x, ankle.y, 0.9)
    }

    fn settings() -> Settings {
        Settings {
            smoother_window: 1,
            ..Settings::default()
        }
    }

    fn squat(target: u32) -> ExerciseSession {
        ExerciseSession::new(
            ExerciseKind::Squat,
            SessionTarget {
                reps: target,
                bonus: false,
            },
            Some(Target::application("A")),
            &settings(),
            Utc::now(),
        )
    }

    fn one_rep(session: &mut ExerciseSession) -> Vec<ExerciseEvent> {
        [170.0, 140.0, 90.0, 130.0, 170.0]
            .iter()
            .flat_map(|angle| session.process(&leg_frame(*angle)))
            .collect()
    }

    #[test]
    fn leg_frame_has_requested_angle() {
        let sample = leg_frame(90.0);
        let get = |joint| sample.get(joint).unwrap().point;
        let angle = crate::pose::joint_angle(
            get(JointName::RightHip),
            get(JointName::RightKnee),
            get(JointName::RightAnkle),
        );
        assert!((angle - 90.0).abs() < 1e-6);
    }

    #[test]
    fn target_reached_fires_exactly_once() {
        let mut session = squat(2);

        let first = one_rep(&mut session);
        assert_eq!(first.len(), 1);

        let second = one_rep(&mut session);
        assert_eq!(second.len(), 2);
        assert!(matches!(
            &second[1],
            ExerciseEvent::TargetReached { count: 2, unlock: Some(_), .. }
        ));
        assert_eq!(session.snapshot().feedback, Feedback::Unlocked);

        let third = one_rep(&mut session);
        assert_eq!(third.len(), 1);
        assert_eq!(session.reps(), 3);
    }

    #[test]
    fn low_confidence_frames_are_skipped() {
        let mut session = squat(5);
        session.process(&leg_frame(170.0));
        let weak = JointSample::new()
            .with(JointName::RightHip, 0.5, 0.4, 0.1)
            .with(JointName::RightKnee, 0.5, 0.6, 0.1)
            .with(JointName::RightAnkle, 0.5, 0.8, 0.1);

        assert!(session.process(&weak).is_empty());
        assert_eq!(session.snapshot().phase, "idle");
    }

    #[test]
    fn bonus_draw_is_seeded() {
        let config = BonusConfig::default();
        for seed in 0..50 {
            assert_eq!(config.draw(seed), config.draw(seed));
        }
    }

    #[test]
    fn bonus_probability_extremes() {
        let always = BonusConfig {
            probability: 1.0,
            ..BonusConfig::default()
        };
        let never = BonusConfig {
            probability: 0.0,
            ..BonusConfig::default()
        };
        for seed in 0..20 {
            assert_eq!(always.draw(seed), SessionTarget { reps: 10, bonus: true });
            assert_eq!(never.draw(seed), SessionTarget { reps: 5, bonus: false });
        }
    }

    #[test]
    fn bonus_session_starts_with_bonus_prompt() {
        let session = ExerciseSession::new(
            ExerciseKind::Pushup,
            SessionTarget { reps: 10, bonus: true },
            None,
            &settings(),
            Utc::now(),
        );
        let snapshot = session.snapshot();
        assert_eq!(snapshot.feedback, Feedback::BonusRound);
        assert_eq!(snapshot.target_reps, 10);
        assert_eq!(snapshot.phase, "up");
    }
}
