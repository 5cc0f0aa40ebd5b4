//! Outage notification scheduling engine.
//!
//! This crate provides:
//! - [`AlertScheduler`] — keyed one-shot timers that fire the messenger
//!   exactly once per (user, window) pair
//! - [`Reconciler`] — startup recovery plus the periodic pass that diffs
//!   subscriptions and source data against the notification ledger
//!
//! The ledger (in `shed-store`) is the source of truth; timers are
//! in-memory only and are rebuilt from `Pending` entries after a restart.

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{ReconcileStats, Reconciler, RecoveryStats};
pub use scheduler::{AlertScheduler, ScheduleOutcome};

#[cfg(test)]
pub(crate) mod testing;
