pub mod exercise_sessions;
pub mod shared_state;
pub mod stats;
