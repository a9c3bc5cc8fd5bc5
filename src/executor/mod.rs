//! Measurement execution
//!
//! - [`scheduler`]: the loop for a single target
//! - [`coordinator`]: one scheduler task per target, shared shutdown

pub mod coordinator;
pub mod scheduler;

pub use coordinator::{outbound_ip, Coordinator, UNKNOWN_LOCATION};
pub use scheduler::{SchedulerSettings, StopReason, TargetOutcome, TargetScheduler};
