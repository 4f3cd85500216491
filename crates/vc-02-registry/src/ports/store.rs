//! # Snapshot Store Port
//!
//! Persistence for the registry between runs.

use crate::domain::ControlPlane;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

/// Loads and saves the whole registry.
pub trait SnapshotStore: Send + Sync {
    /// Last saved state, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<ControlPlane>, StoreError>;

    /// Replace the saved state.
    fn save(&self, state: &ControlPlane) -> Result<(), StoreError>;
}
