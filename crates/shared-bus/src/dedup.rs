//! # Delivery De-duplication
//!
//! QoS 1 is at-least-once: a broker may hand the same request over twice
//! (redelivery after a reconnect, or a publisher retry). The dispatcher must
//! not execute a mutation twice for one delivery.
//!
//! A delivery is identified by its request id plus a SHA-256 digest of the
//! payload, so a caller that reuses an id for a *different* request is not
//! mistaken for a duplicate. Entries live for a bounded window and are
//! garbage-collected periodically, which bounds memory.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from dedup checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DedupError {
    /// The same request was already delivered within the window.
    #[error("Duplicate delivery of request {id}")]
    Duplicate { id: String },
}

/// Time-bounded cache of recently seen deliveries.
pub struct DeliveryDedup {
    /// (request id, payload digest) -> first seen.
    seen: HashMap<(String, [u8; 32]), Instant>,

    /// How long a delivery is remembered.
    window: Duration,

    last_gc: Instant,

    gc_interval: Duration,
}

impl DeliveryDedup {
    /// Default memory of a delivery.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2);

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_WINDOW, Self::DEFAULT_GC_INTERVAL)
    }

    #[must_use]
    pub fn with_config(window: Duration, gc_interval: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            window,
            last_gc: Instant::now(),
            gc_interval,
        }
    }

    /// Record a delivery, rejecting it if seen within the window.
    ///
    /// # Errors
    ///
    /// - `DedupError::Duplicate` - same id and identical payload seen recently
    pub fn check_and_record(&mut self, id: &str, payload: &[u8]) -> Result<(), DedupError> {
        let now = Instant::now();

        if now.duration_since(self.last_gc) > self.gc_interval {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        let digest: [u8; 32] = Sha256::digest(payload).into();
        let key = (id.to_string(), digest);
        match self.seen.get(&key) {
            Some(first_seen) if now.duration_since(*first_seen) <= self.window => {
                Err(DedupError::Duplicate { id: id.to_string() })
            }
            _ => {
                self.seen.insert(key, now);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// A zero window disables suppression.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    fn garbage_collect(&mut self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_, first_seen| now.duration_since(*first_seen) <= window);
    }
}

impl Default for DeliveryDedup {
    fn default() -> Self {
        Self::new()
    }
}
