//! Expiry triggers.
//!
//! Two independent sources drive the ledger's expiry path: a foreground
//! poll while the app is alive, and best-effort OS interval callbacks that
//! may run in another process entirely. Both call
//! [`SessionLedger::reconcile`](crate::ledger::SessionLedger::reconcile)
//! and neither knows about the other.

mod poller;
mod triggers;

pub use poller::ExpiryPoller;
pub use triggers::{
    register_session_schedule, BackgroundTrigger, ScheduleRegistrar, ScheduleRegistration,
    MINIMUM_SCHEDULE_INTERVAL_MINUTES, SESSION_ACTIVITY,
};
