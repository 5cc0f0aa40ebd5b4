//! Outage source adapter.
//!
//! This crate provides:
//! - `OutageSource` trait for pluggable outage-data backends
//! - eskom-calendar HTTP client implementation
//!
//! The engine only consumes `fetch_windows`; `fuzzy_search` and
//! `list_areas` serve the inbound command layer.

pub mod client;
pub mod error;
pub mod traits;

pub use client::EskomCalendarClient;
pub use error::SourceError;
pub use traits::OutageSource;
