//! Outbound messaging for load-shedding alerts.
//!
//! This crate provides:
//! - `Messenger` trait for the delivery channel (the gateway owns
//!   retries and delivery receipts; callers only get "attempted")
//! - HTTP gateway messenger implementation
//! - Minijinja rendering for the alert message body

pub mod gateway;
pub mod log;
pub mod message;
pub mod traits;

pub use gateway::HttpGatewayMessenger;
pub use log::LogMessenger;
pub use message::AlertMessage;
pub use traits::{Messenger, NotifyError};
