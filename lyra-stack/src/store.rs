//! Stack store trait and error types

use async_trait::async_trait;
use thiserror::Error;

use lyra_core::ids::PlatformId;

use crate::stack::Stack;

/// Errors that can occur when interacting with a stack store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stack not found: {0}")]
    NotFound(PlatformId),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The stack is locked by another operation
    #[error("stack {stack_id} is locked by {who} (lock id: {lock_id})")]
    Locked {
        stack_id: PlatformId,
        lock_id: String,
        who: String,
    },

    #[error("lock not found: {0}")]
    LockNotFound(String),

    #[error("lock id mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("invalid stack record: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for `list_stacks`; empty fields match everything
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub ids: Vec<PlatformId>,
    pub names: Vec<String>,
}

impl ListFilter {
    fn matches(&self, stack: &Stack) -> bool {
        let id_ok = self.ids.is_empty() || self.ids.contains(&stack.id);
        let name_ok = self.names.is_empty()
            || stack
                .latest_event()
                .map(|e| self.names.contains(&e.name))
                .unwrap_or(false);
        id_ok && name_ok
    }

    /// Apply the filter to a full listing
    pub fn filter(&self, stacks: Vec<Stack>) -> Vec<Stack> {
        stacks.into_iter().filter(|s| self.matches(s)).collect()
    }
}

/// Persistence seam for stacks
///
/// Implementations must treat `update_stack` as whole-record replacement;
/// the event log inside the record only ever grows.
#[async_trait]
pub trait StackStore: Send + Sync {
    async fn create_stack(&self, stack: Stack) -> StoreResult<()>;

    async fn read_stack_by_id(&self, id: PlatformId) -> StoreResult<Stack>;

    async fn list_stacks(&self, org_id: PlatformId, filter: ListFilter) -> StoreResult<Vec<Stack>>;

    async fn update_stack(&self, stack: Stack) -> StoreResult<()>;

    async fn delete_stack(&self, id: PlatformId) -> StoreResult<()>;
}
