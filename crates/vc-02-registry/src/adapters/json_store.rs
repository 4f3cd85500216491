use crate::domain::ControlPlane;
use crate::ports::store::{SnapshotStore, StoreError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Registry snapshot kept as one JSON file.
///
/// Saves go to a sibling temp file that is synced and renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<ControlPlane>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No registry snapshot, starting empty");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let state: ControlPlane = serde_json::from_slice(&bytes)?;
        info!(
            path = %self.path.display(),
            instances = state.instance_count(),
            "Loaded registry snapshot"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &ControlPlane) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Saved registry snapshot");
        Ok(())
    }
}
