//! Transcript stores
//!
//! Transcripts are written by an external upload path and only read here.
//! [`FsTranscriptStore`] keeps each transcript as `{root}/{uuid}.txt`.

use crate::TranscriptStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use verity_core::{
    EntityType, HealthCheck, StorageError, VerityError, VerityResult,
};

/// File extension used for transcript files.
pub const TRANSCRIPT_EXTENSION: &str = "txt";

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryTranscriptStore {
    transcripts: DashMap<Uuid, String>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` under a fresh id and return it.
    pub fn insert(&self, content: impl Into<String>) -> Uuid {
        let id = Uuid::now_v7();
        self.transcripts.insert(id, content.into());
        id
    }

    pub fn insert_with_id(&self, transcript_id: Uuid, content: impl Into<String>) {
        self.transcripts.insert(transcript_id, content.into());
    }

    pub fn remove(&self, transcript_id: Uuid) -> Option<String> {
        self.transcripts.remove(&transcript_id).map(|(_, content)| content)
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn exists(&self, transcript_id: Uuid) -> VerityResult<bool> {
        Ok(self.transcripts.contains_key(&transcript_id))
    }

    async fn read_content(&self, transcript_id: Uuid) -> VerityResult<String> {
        self.transcripts
            .get(&transcript_id)
            .map(|content| content.clone())
            .ok_or_else(|| VerityError::transcript_not_found(transcript_id))
    }
}

// ============================================================================
// FILESYSTEM
// ============================================================================

/// Directory of `{uuid}.txt` transcript files.
#[derive(Debug, Clone)]
pub struct FsTranscriptStore {
    root: PathBuf,
}

impl FsTranscriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, transcript_id: Uuid) -> PathBuf {
        self.root
            .join(format!("{}.{}", transcript_id, TRANSCRIPT_EXTENSION))
    }

    /// Write `content` as a new transcript, creating the root directory if
    /// needed.
    pub async fn save(&self, content: &str) -> VerityResult<Uuid> {
        let id = Uuid::now_v7();
        let insert_failed = |e: std::io::Error| {
            VerityError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::Transcript,
                reason: e.to_string(),
            })
        };
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(insert_failed)?;
        tokio::fs::write(self.path_for(id), content)
            .await
            .map_err(insert_failed)?;
        tracing::debug!(
            transcript_id = %id,
            bytes = content.len(),
            "Transcript saved"
        );
        Ok(id)
    }
}

#[async_trait]
impl TranscriptStore for FsTranscriptStore {
    async fn exists(&self, transcript_id: Uuid) -> VerityResult<bool> {
        tokio::fs::try_exists(self.path_for(transcript_id))
            .await
            .map_err(|e| read_failed(transcript_id, e))
    }

    async fn read_content(&self, transcript_id: Uuid) -> VerityResult<String> {
        match tokio::fs::read_to_string(self.path_for(transcript_id)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(VerityError::transcript_not_found(transcript_id))
            }
            Err(e) => Err(read_failed(transcript_id, e)),
        }
    }

    async fn health_check(&self) -> HealthCheck {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => HealthCheck::healthy("transcript_store"),
            Ok(_) => HealthCheck::unhealthy(
                "transcript_store",
                format!("{} is not a directory", self.root.display()),
            ),
            Err(e) => HealthCheck::unhealthy(
                "transcript_store",
                format!("{}: {}", self.root.display(), e),
            ),
        }
    }
}

fn read_failed(transcript_id: Uuid, error: std::io::Error) -> VerityError {
    VerityError::Storage(StorageError::ReadFailed {
        entity_type: EntityType::Transcript,
        id: transcript_id,
        reason: error.to_string(),
    })
}
