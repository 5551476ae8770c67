//! Local file store for stacks
//!
//! Stores every stack in one JSON file (default: lyra.stacks.json) and uses
//! per-stack .lock files as the advisory lock. Suited to development and
//! single-host deployments.

use std::path::PathBuf;

use async_trait::async_trait;

use lyra_core::ids::PlatformId;

use crate::lock::LockInfo;
use crate::stack::Stack;
use crate::store::{ListFilter, StackStore, StoreError, StoreResult};

pub struct LocalStackStore {
    store_path: PathBuf,
}

impl LocalStackStore {
    /// Default store file name
    pub const DEFAULT_STORE_FILE: &'static str = "lyra.stacks.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STORE_FILE))
    }

    pub fn with_path(store_path: PathBuf) -> Self {
        Self { store_path }
    }

    pub fn store_path(&self) -> &PathBuf {
        &self.store_path
    }

    fn lock_path(&self, stack_id: PlatformId) -> PathBuf {
        self.store_path.with_extension(format!("{stack_id}.lock"))
    }

    fn read_all(&self) -> StoreResult<Vec<Stack>> {
        if !self.store_path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.store_path)
            .map_err(|e| StoreError::Io(format!("failed to read store file: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::InvalidRecord(format!("failed to parse store file: {e}")))
    }

    fn write_all(&self, stacks: &[Stack]) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(stacks)
            .map_err(|e| StoreError::Serialization(format!("failed to serialize stacks: {e}")))?;
        std::fs::write(&self.store_path, content)
            .map_err(|e| StoreError::Io(format!("failed to write store file: {e}")))
    }

    /// Acquire the advisory lock for one stack
    pub fn acquire_lock(&self, stack_id: PlatformId, operation: &str) -> StoreResult<LockInfo> {
        let lock_path = self.lock_path(stack_id);
        if lock_path.exists() {
            let content = std::fs::read_to_string(&lock_path)
                .map_err(|e| StoreError::Io(format!("failed to read lock file: {e}")))?;
            if let Ok(existing) = serde_json::from_str::<LockInfo>(&content) {
                if !existing.is_expired() {
                    return Err(StoreError::Locked {
                        stack_id,
                        lock_id: existing.id,
                        who: existing.who,
                    });
                }
            }
        }

        let lock = LockInfo::new(stack_id, operation);
        let content = serde_json::to_string_pretty(&lock)
            .map_err(|e| StoreError::Serialization(format!("failed to serialize lock: {e}")))?;
        std::fs::write(&lock_path, content)
            .map_err(|e| StoreError::Io(format!("failed to write lock file: {e}")))?;
        Ok(lock)
    }

    /// Release a previously acquired lock; the ids must match
    pub fn release_lock(&self, lock: &LockInfo) -> StoreResult<()> {
        let lock_path = self.lock_path(lock.stack_id);
        if !lock_path.exists() {
            return Err(StoreError::LockNotFound(lock.id.clone()));
        }
        let content = std::fs::read_to_string(&lock_path)
            .map_err(|e| StoreError::Io(format!("failed to read lock file: {e}")))?;
        let existing: LockInfo = serde_json::from_str(&content)
            .map_err(|e| StoreError::InvalidRecord(format!("failed to parse lock file: {e}")))?;
        if existing.id != lock.id {
            return Err(StoreError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }
        std::fs::remove_file(&lock_path)
            .map_err(|e| StoreError::Io(format!("failed to remove lock file: {e}")))
    }
}

impl Default for LocalStackStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StackStore for LocalStackStore {
    async fn create_stack(&self, stack: Stack) -> StoreResult<()> {
        let mut stacks = self.read_all()?;
        if stacks.iter().any(|s| s.id == stack.id) {
            return Err(StoreError::Conflict(format!(
                "stack {} already exists",
                stack.id
            )));
        }
        stacks.push(stack);
        self.write_all(&stacks)
    }

    async fn read_stack_by_id(&self, id: PlatformId) -> StoreResult<Stack> {
        self.read_all()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_stacks(&self, org_id: PlatformId, filter: ListFilter) -> StoreResult<Vec<Stack>> {
        let stacks = self
            .read_all()?
            .into_iter()
            .filter(|s| s.org_id == org_id)
            .collect();
        Ok(filter.filter(stacks))
    }

    async fn update_stack(&self, stack: Stack) -> StoreResult<()> {
        let mut stacks = self.read_all()?;
        let slot = stacks
            .iter_mut()
            .find(|s| s.id == stack.id)
            .ok_or(StoreError::NotFound(stack.id))?;
        *slot = stack;
        self.write_all(&stacks)
    }

    async fn delete_stack(&self, id: PlatformId) -> StoreResult<()> {
        let mut stacks = self.read_all()?;
        let before = stacks.len();
        stacks.retain(|s| s.id != id);
        if stacks.len() == before {
            return Err(StoreError::NotFound(id));
        }
        self.write_all(&stacks)
    }
}
