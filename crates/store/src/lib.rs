//! Durable state for the alert engine.
//!
//! This crate provides:
//! - `SubscriptionStore` — user -> area mapping
//! - `NotificationLedger` — per-(user, window) alert records
//!
//! Both persist to a single JSON document each, written atomically
//! (tmp + rename) before any mutation returns. Timers are always
//! rebuilt from the ledger after a restart, never the other way
//! around, so a mutation that is not yet on disk must not be
//! observable by callers.

mod document;

pub mod error;
pub mod ledger;
pub mod subscriptions;

pub use error::StoreError;
pub use ledger::NotificationLedger;
pub use subscriptions::SubscriptionStore;
