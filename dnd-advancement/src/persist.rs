//! Character persistence.
//!
//! The advancement engine hands its finished [`CharacterUpdate`] to a
//! [`CharacterStore`]. [`MemoryStore`] keeps characters in process;
//! [`SavedCharacter`] is the versioned JSON save file format.

use crate::assembler::CharacterUpdate;
use crate::world::{Character, CharacterId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Character not found: {0}")]
    NotFound(CharacterId),

    #[error("Update rejected: {0}")]
    Rejected(String),
}

/// Destination for committed advancement updates.
pub trait CharacterStore {
    fn apply_update(
        &mut self,
        id: CharacterId,
        update: &CharacterUpdate,
    ) -> Result<(), PersistError>;
}

/// In-process character store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    characters: HashMap<CharacterId, Character>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, character: Character) {
        self.characters.insert(character.id, character);
    }

    pub fn get(&self, id: CharacterId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

impl CharacterStore for MemoryStore {
    fn apply_update(
        &mut self,
        id: CharacterId,
        update: &CharacterUpdate,
    ) -> Result<(), PersistError> {
        if update.character_id != id {
            return Err(PersistError::Rejected(format!(
                "update is for {}, not {id}",
                update.character_id
            )));
        }
        let character = self
            .characters
            .get_mut(&id)
            .ok_or(PersistError::NotFound(id))?;
        update.apply_to(character);
        debug!(character = %id, level = update.level, "Applied character update");
        Ok(())
    }
}

// ============================================================================
// Save Files
// ============================================================================

/// Current character save file version.
const CHARACTER_SAVE_VERSION: u32 = 1;

/// A saved character that can be reused across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCharacter {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the character was saved.
    pub saved_at: String,

    /// The complete character data.
    pub character: Character,

    /// Quick-access metadata about the character.
    pub metadata: CharacterMetadata,
}

/// Metadata about a saved character for quick display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterMetadata {
    pub name: String,

    /// Primary class name.
    pub class: String,

    /// Primary subclass name, once chosen.
    #[serde(default)]
    pub subclass: Option<String>,

    pub level: u8,
}

impl CharacterMetadata {
    fn of(character: &Character) -> Self {
        let primary = character.primary_class();
        Self {
            name: character.name.clone(),
            class: primary
                .map(|c| c.class.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            subclass: primary.and_then(|c| c.subclass.as_ref().map(|s| s.name.clone())),
            level: character.level,
        }
    }
}

impl SavedCharacter {
    /// Create a new saved character from a Character.
    pub fn new(character: Character) -> Self {
        Self {
            version: CHARACTER_SAVE_VERSION,
            saved_at: chrono_now(),
            metadata: CharacterMetadata::of(&character),
            character,
        }
    }

    /// Apply a committed update and refresh the metadata.
    pub fn apply_update(&mut self, update: &CharacterUpdate) -> Result<(), PersistError> {
        if update.character_id != self.character.id {
            return Err(PersistError::NotFound(update.character_id));
        }
        update.apply_to(&mut self.character);
        self.metadata = CharacterMetadata::of(&self.character);
        self.saved_at = chrono_now();
        Ok(())
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content).await?;
        info!(path = %path.as_ref().display(), character = %self.metadata.name, "Saved character");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != CHARACTER_SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: CHARACTER_SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Get metadata without loading the full character.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<CharacterMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: CharacterMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != CHARACTER_SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: CHARACTER_SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

impl CharacterStore for SavedCharacter {
    fn apply_update(
        &mut self,
        id: CharacterId,
        update: &CharacterUpdate,
    ) -> Result<(), PersistError> {
        if id != self.character.id {
            return Err(PersistError::NotFound(id));
        }
        SavedCharacter::apply_update(self, update)
    }
}

/// Information about a character save file.
#[derive(Debug, Clone)]
pub struct CharacterSaveInfo {
    /// Path to the save file.
    pub path: String,

    /// Character metadata.
    pub metadata: CharacterMetadata,
}

/// List all character save files in a directory.
pub async fn list_character_saves(
    dir: impl AsRef<Path>,
) -> Result<Vec<CharacterSaveInfo>, PersistError> {
    let mut saves = Vec::new();

    let dir_path = dir.as_ref();
    if !dir_path.exists() {
        fs::create_dir_all(dir_path).await?;
        return Ok(saves);
    }

    let mut entries = fs::read_dir(dir_path).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedCharacter::peek_metadata(&path).await {
                saves.push(CharacterSaveInfo {
                    path: path.to_string_lossy().to_string(),
                    metadata,
                });
            }
        }
    }

    saves.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    Ok(saves)
}

/// Generate a save path for a character.
pub fn character_save_path(dir: impl AsRef<Path>, name: &str) -> std::path::PathBuf {
    let sanitized = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    dir.as_ref().join(format!("{sanitized}.json"))
}

/// Seconds since the Unix epoch, as a string.
fn chrono_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", now.as_secs())
}
