//! Saving and loading conversations.
//!
//! One JSON file per conversation, keyed by the founding participant
//! set so reopening the same group resumes where it left off. The saved
//! form carries an explicit version; loading an unknown version fails
//! loudly instead of misreading the file.

use crate::roster::ParticipantRoster;
use crate::transcript::Transcript;
use crate::world::CharacterId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported save version {found} (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Stable identity for one conversation, derived from the participants
/// who founded it. Later joins and departures do not change the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key for a participant set. Order-insensitive and duplicate-safe,
    /// so callers need not normalize.
    pub fn for_participants(participants: impl IntoIterator<Item = CharacterId>) -> Self {
        let mut ids: Vec<String> = participants
            .into_iter()
            .map(|id| id.0.simple().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        Self(ids.join("+"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for this conversation under a save directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The on-disk form of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedConversation {
    pub version: u32,
    pub key: ConversationKey,
    pub roster: ParticipantRoster,
    pub transcript: Transcript,
}

impl SavedConversation {
    pub fn new(key: ConversationKey, roster: ParticipantRoster, transcript: Transcript) -> Self {
        Self {
            version: SAVE_VERSION,
            key,
            roster,
            transcript,
        }
    }

    /// Path of this conversation's file under `dir`.
    pub fn path_under(&self, dir: &Path) -> PathBuf {
        dir.join(self.key.file_name())
    }

    /// Write to its file under `dir`, creating the directory if needed.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, PersistError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = self.path_under(dir);
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json).await?;
        info!(key = %self.key, path = %path.display(), "conversation saved");
        Ok(path)
    }

    /// Load the conversation for `key` from `dir`. Returns `Ok(None)`
    /// when no file exists, so first contact with a group is not an
    /// error.
    pub async fn load(dir: &Path, key: &ConversationKey) -> Result<Option<Self>, PersistError> {
        let path = dir.join(key.file_name());
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let saved: Self = serde_json::from_str(&json)?;
        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        Ok(Some(saved))
    }
}
