//! Advisory lock records for serializing applies to one stack
//!
//! The engine itself gives no cross-apply serialization guarantee; callers
//! hold one of these, keyed by stack id, around each apply.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use lyra_core::ids::PlatformId;

/// Default lock timeout in seconds (15 minutes)
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 900;

/// Information about a held stack lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique identifier for this lock
    pub id: String,
    /// The stack the lock covers
    pub stack_id: PlatformId,
    /// The operation being performed (e.g. "apply", "uninstall")
    pub operation: String,
    /// Who acquired the lock (username@hostname)
    pub who: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(stack_id: PlatformId, operation: impl Into<String>) -> Self {
        Self::with_timeout(stack_id, operation, DEFAULT_LOCK_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        stack_id: PlatformId,
        operation: impl Into<String>,
        timeout_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stack_id,
            operation: operation.into(),
            who: lock_owner(),
            created: now,
            expires: now + Duration::seconds(timeout_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }

    pub fn time_remaining(&self) -> Duration {
        self.expires - Utc::now()
    }
}

fn lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", username, hostname)
}
