//! Campaign persistence for save/load functionality.
//!
//! A save is a single JSON document holding the whole world. Loading checks
//! the format version and the world's referential integrity before handing
//! it back.

use crate::world::{IntegrityError, TimeSlot, World};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Saved world is inconsistent: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved campaign with all state needed to resume play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCampaign {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created, in seconds since the Unix epoch.
    pub saved_at: String,

    pub metadata: SaveMetadata,

    /// The complete world state.
    pub world: World,
}

/// Summary readable without loading the whole world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub campaign_name: String,
    pub day: u32,
    pub time_slot: TimeSlot,
    pub participants: Vec<String>,
}

impl SavedCampaign {
    pub fn new(world: World) -> Self {
        let metadata = SaveMetadata {
            campaign_name: world.session.campaign_name.clone(),
            day: world.session.day,
            time_slot: world.session.time_slot,
            participants: world
                .session
                .participants
                .iter()
                .map(|p| p.to_string())
                .collect(),
        };
        Self {
            version: SAVE_VERSION,
            saved_at: unix_now(),
            metadata,
            world,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file, checking version and integrity.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        saved.world.validate()?;

        Ok(saved)
    }

    /// Read only the metadata of a save file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }
        Ok(partial.metadata)
    }
}

/// Information about a save file.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: SaveMetadata,
}

/// List the readable saves in a directory, sorted by path.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedCampaign::peek_metadata(&path).await {
                saves.push(SaveInfo { path, metadata });
            }
        }
    }

    saves.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(saves)
}

/// File name for a campaign's save in `base_dir`.
pub fn save_path(base_dir: impl AsRef<Path>, campaign_name: &str) -> PathBuf {
    let sanitized = campaign_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_world;

    #[test]
    fn test_save_path_sanitizes() {
        let path = save_path("/tmp/saves", "The Shadow/Over Innsmouth");
        assert_eq!(path, PathBuf::from("/tmp/saves/The_Shadow_Over_Innsmouth.json"));
    }

    #[test]
    fn test_resources_persist_as_pairs() {
        let saved = SavedCampaign::new(sample_world());
        let json = serde_json::to_value(&saved).unwrap();
        assert_eq!(json["world"]["entities"]["ada"]["resources"]["sanity"], serde_json::json!([80, 80]));
    }

    #[test]
    fn test_version_mismatch() {
        let mut saved = SavedCampaign::new(sample_world());
        saved.version = 99;
        let json = serde_json::to_string(&saved).unwrap();
        assert!(matches!(
            SavedCampaign::from_json(&json),
            Err(PersistError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_integrity_checked_on_load() {
        let saved = SavedCampaign::new(sample_world());
        let mut json = serde_json::to_value(&saved).unwrap();
        json["world"]["entities"]["ada"]["location"] = serde_json::json!("atlantis");
        let err = SavedCampaign::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, PersistError::Integrity(IntegrityError::DanglingEntityLocation { .. })));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let path = save_path(dir.path(), "Test Campaign");
        let world = sample_world();

        SavedCampaign::new(world.clone()).save_json(&path).await.unwrap();
        let loaded = SavedCampaign::load_json(&path).await.unwrap();
        assert_eq!(loaded.world, world);

        let saves = list_saves(dir.path()).await.unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].metadata.campaign_name, world.session.campaign_name);
    }
}
