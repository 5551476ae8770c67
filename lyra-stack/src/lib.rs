//! Lyra Stack Management
//!
//! Persistent binding between a template instance and its realized resources.
//! A stack is an append-only event log; this crate provides the model, the
//! `StackStore` persistence seam with a local JSON implementation, and
//! advisory per-stack locks for callers that serialize applies.

pub mod lock;
pub mod stack;
pub mod store;
pub mod stores;

pub use lock::{LockInfo, DEFAULT_LOCK_TIMEOUT_SECS};
pub use stack::{
    merge_stack_update, Stack, StackAdditionalResource, StackEvent, StackEventType, StackStatus,
    StackUpdate,
};
pub use store::{ListFilter, StackStore, StoreError, StoreResult};
pub use stores::LocalStackStore;
