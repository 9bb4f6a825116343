//! Repetition detection.
//!
//! Each exercise is a small hysteresis state machine over one joint angle.
//! Frames that lack the joints it needs are skipped without a transition.

mod controller;
mod pushup;
mod session;
mod squat;

use serde::{Deserialize, Serialize};

use crate::pose::SmoothedJoints;

pub use controller::ExerciseController;
pub use pushup::{PushupClassifier, PushupState, PushupThresholds};
pub use session::{BonusConfig, ExerciseEvent, ExerciseSession, SessionSnapshot, SessionTarget};
pub use squat::{SquatClassifier, SquatState, SquatThresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExerciseKind {
    Squat,
    Pushup,
}

impl ExerciseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "Squat",
            ExerciseKind::Pushup => "Pushup",
        }
    }
}

/// Prompt shown to the user for the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feedback {
    StandInFrame,
    GetInPosition,
    BonusRound,
    SquatDown,
    GoingDown,
    Hold,
    PushUp,
    GoDown,
    Push,
    GoLower,
    GoodRep,
    Unlocked,
}

impl Feedback {
    pub fn message(&self) -> &'static str {
        match self {
            Feedback::StandInFrame => "Stand in frame",
            Feedback::GetInPosition => "Get in position",
            Feedback::BonusRound => "BONUS ROUND!",
            Feedback::SquatDown => "Squat down!",
            Feedback::GoingDown => "Going down...",
            Feedback::Hold => "Hold...",
            Feedback::PushUp => "Push up!",
            Feedback::GoDown => "Go down!",
            Feedback::Push => "Push!",
            Feedback::GoLower => "Go lower!",
            Feedback::GoodRep => "Good rep!",
            Feedback::Unlocked => "UNLOCKED!",
        }
    }
}

/// Result of feeding one angle into a classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Step {
    pub counted: bool,
    /// `None` leaves the previous prompt in place.
    pub feedback: Option<Feedback>,
}

impl Step {
    fn prompt(feedback: Feedback) -> Self {
        Self {
            counted: false,
            feedback: Some(feedback),
        }
    }

    fn rep() -> Self {
        Self {
            counted: true,
            feedback: Some(Feedback::GoodRep),
        }
    }
}

/// A classifier's verdict on one evaluable frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub angle: f64,
    pub step: Step,
}

pub trait RepClassifier: Send {
    fn kind(&self) -> ExerciseKind;

    /// Feed one smoothed frame. `None` when the required joints are missing.
    fn observe(&mut self, joints: &SmoothedJoints) -> Option<Reading>;

    /// Name of the current phase, for display and logs.
    fn phase(&self) -> &'static str;

    fn reset(&mut self);
}
