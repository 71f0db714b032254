//! Snapshot persistence collaborator.
//!
//! The core only asks two things of persistence: load all profiles at
//! startup and replace the stored set after mutations. Both are served
//! by one JSON file holding every profile in roster order, rewritten
//! periodically and on shutdown. No file means a fresh registry.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::profile_store::{Profile, ProfileStore};

/// On-disk snapshot format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Profiles in roster (registration) order.
    pub profiles: Vec<Profile>,
    /// When the snapshot was written, unix seconds.
    pub saved_at: u64,
}

/// Write all profiles to `path`, creating parent directories as needed.
pub async fn save_snapshot(
    profiles: Vec<Profile>,
    saved_at: u64,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = RegistrySnapshot { profiles, saved_at };
    let json = serde_json::to_string_pretty(&snapshot)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Read a snapshot back from `path`.
pub fn load_snapshot(path: &Path) -> Result<RegistrySnapshot, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Load `path` into a fully checked store, or start empty when the file
/// does not exist yet. A file that exists but fails parsing or violates
/// a registry invariant is an error, not a fresh start.
pub fn load_or_default(path: &Path) -> Result<ProfileStore, Box<dyn std::error::Error>> {
    if !path.exists() {
        info!("No previous snapshot found, starting with an empty registry");
        return Ok(ProfileStore::new());
    }

    let snapshot = load_snapshot(path)?;
    let count = snapshot.profiles.len();
    let store = ProfileStore::restore(snapshot.profiles)?;
    info!("Loaded {} profiles from snapshot {}", count, path.display());
    Ok(store)
}
