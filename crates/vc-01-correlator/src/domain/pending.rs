//! Pending Call Store - bridges a published request to its eventual response.
//!
//! Maps request ids to the oneshot of the caller awaiting the response.
//! Every entry is removed exactly once, by whichever of `complete`,
//! `expire`, `cancel` or the deadline sweep gets to it first; the others
//! then see an unknown id.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use shared_types::{RequestId, RpcErrorObject};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Longest wait a deadline can express. Larger timeouts are clamped to it.
pub const MAX_WAIT: Duration = Duration::from_secs(86_400 * 365);

/// Response delivered to a waiting caller.
#[derive(Debug)]
pub struct CallResolution {
    pub id: RequestId,
    pub result: Result<Value, RpcErrorObject>,
    pub response_time: Duration,
}

/// A call waiting for its response.
struct PendingCall {
    sender: oneshot::Sender<CallResolution>,
    created_at: Instant,
    deadline: Instant,
    /// Method name (for logging)
    method: String,
}

/// Counters for the pending store.
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_cancelled: AtomicU64,
    /// Responses whose id matched nothing (late, duplicate or spurious).
    pub total_unmatched: AtomicU64,
}

/// Plain copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
    pub unmatched: u64,
}

impl PendingStats {
    #[must_use]
    pub fn snapshot(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
            unmatched: self.total_unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Pending call table.
///
/// Flow:
/// 1. Client generates a `RequestId`
/// 2. Client calls `register()` to get a oneshot receiver
/// 3. Client publishes the request envelope
/// 4. Response listener receives the response and calls `complete()`
/// 5. Client awaits the receiver or gives up via `expire()` / `cancel()`
#[derive(Default)]
pub struct PendingCallStore {
    pending: DashMap<RequestId, PendingCall>,
    stats: PendingStats,
}

impl PendingCallStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call under `id` with `deadline = now + timeout`.
    ///
    /// Returns `None` if a call with that id is already pending; the id is
    /// not reused while it is.
    pub fn register(
        &self,
        id: RequestId,
        method: &str,
        timeout: Duration,
    ) -> Option<oneshot::Receiver<CallResolution>> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();

        match self.pending.entry(id) {
            Entry::Occupied(occupied) => {
                warn!(request_id = %occupied.key(), method, "Request id already pending");
                None
            }
            Entry::Vacant(vacant) => {
                debug!(request_id = %vacant.key(), method, "Registered pending call");
                vacant.insert(PendingCall {
                    sender: tx,
                    created_at: now,
                    deadline: now.checked_add(timeout).unwrap_or(now + MAX_WAIT),
                    method: method.to_string(),
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                Some(rx)
            }
        }
    }

    /// Resolve a pending call with its response.
    ///
    /// Returns true if the call was found and its caller received the result.
    pub fn complete(&self, id: &RequestId, result: Result<Value, RpcErrorObject>) -> bool {
        let Some((id, pending)) = self.pending.remove(id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(request_id = %id, "Response for unknown or expired request id, discarding");
            return false;
        };

        let response_time = pending.created_at.elapsed();
        let resolution = CallResolution {
            id: id.clone(),
            result,
            response_time,
        };

        match pending.sender.send(resolution) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id = %id,
                    method = pending.method,
                    response_time_ms = response_time.as_millis() as u64,
                    "Completed pending call"
                );
                true
            }
            Err(_) => {
                // Receiver was dropped without cancelling
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %id, method = pending.method, "Pending call receiver dropped");
                false
            }
        }
    }

    /// Remove a call whose caller observed its deadline. Returns false if the
    /// call was already resolved.
    pub fn expire(&self, id: &RequestId) -> bool {
        match self.pending.remove(id) {
            Some((_, pending)) => {
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    request_id = %id,
                    method = pending.method,
                    elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
                    "Pending call timed out"
                );
                true
            }
            None => false,
        }
    }

    /// Remove a call at the caller's request. Terminal: a later response for
    /// this id is discarded as unmatched.
    pub fn cancel(&self, id: &RequestId) -> bool {
        if self.pending.remove(id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %id, "Pending call cancelled");
            true
        } else {
            false
        }
    }

    /// Remove every call whose deadline has passed.
    ///
    /// Returns the number of calls removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, call| {
            if now >= call.deadline {
                warn!(
                    request_id = %id,
                    method = call.method,
                    "Removing expired pending call"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

/// Background sweep of calls whose deadline passed without anyone awaiting them.
pub async fn cleanup_task(store: Arc<PendingCallStore>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed, "Cleaned up expired pending calls");
        }
    }
}
