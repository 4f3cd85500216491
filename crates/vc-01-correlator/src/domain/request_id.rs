//! Request id generation.
//!
//! Ids are `<salt>-<counter>`: the salt separates concurrent client
//! processes on one broker, the counter separates calls within a process.
//! Uniqueness, not unguessability, is the requirement.

use shared_types::RequestId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id source for one correlator.
#[derive(Debug)]
pub struct RequestIdGenerator {
    salt: String,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Generator with a random process-local salt.
    #[must_use]
    pub fn new() -> Self {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        Self::with_salt(&salt[..8])
    }

    #[must_use]
    pub fn with_salt(salt: &str) -> Self {
        Self {
            salt: salt.to_string(),
            counter: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Next id. Never repeats within this generator's lifetime short of
    /// counter wrap-around, which the pending store still guards against.
    pub fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId::new(format!("{}-{}", self.salt, n))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
