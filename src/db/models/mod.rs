pub mod exercise_session;
pub mod shared_state;
pub mod stats;

pub use exercise_session::{ExerciseRecord, ExerciseStatus};
pub use shared_state::{SharedState, EXEMPTIONS_KEY, SELECTION_KEY};
pub use stats::UserStats;
