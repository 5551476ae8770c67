//! Lyra Service
//!
//! The orchestrating facade over the lyra reconciliation engine: dry-run,
//! apply, export, and the stack lifecycle operations, wired to the service
//! seams and the stack store.

pub mod service;
pub mod sources;

pub use service::{CreateStackRequest, ExportRequest, Service};
pub use sources::normalize_remote_sources;
