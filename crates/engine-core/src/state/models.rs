use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Holder of a worker's mutual-exclusion lock.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LockRecord {
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Circuit-breaker flag set by operators when upstream reference data is bad.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BreakerFlag {
    pub reason: String,
    pub tripped_at: DateTime<Utc>,
}
