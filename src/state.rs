//! Snapshot persistence for the pattern store.
//!
//! The store's logs are written as pretty JSON to `[state].path`. Writes
//! go to a sibling temp file that is then renamed over the target, so a
//! crash never leaves a half-written snapshot behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use jobsight_core::learning::{StoreSnapshot, SNAPSHOT_VERSION};

/// Read a snapshot. A missing file is `Ok(None)`.
pub fn load_snapshot(path: &Path) -> Result<Option<StoreSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    let snapshot: StoreSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
    if snapshot.version > SNAPSHOT_VERSION {
        bail!(
            "State file {} has version {}, this build reads up to {}",
            path.display(),
            snapshot.version,
            SNAPSHOT_VERSION
        );
    }
    tracing::debug!(
        path = %path.display(),
        corrections = snapshot.corrections.len(),
        discovered = snapshot.discovered.len(),
        "loaded store snapshot"
    );
    Ok(Some(snapshot))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state.json".into());
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    path.with_file_name(name)
}

/// Write a snapshot atomically, creating parent directories as needed.
pub fn save_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = temp_path(path);
    fs::write(&tmp, json)
        .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace state file: {}", path.display()));
    }
    tracing::debug!(path = %path.display(), "saved store snapshot");
    Ok(())
}
