//! Bookmark store access over HTTP plus atomic JSON artifact storage.

mod client;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub use client::{BookmarkStore, StoreClient, StoreClientConfig, StoreError};

pub const CRATE_NAME: &str = "tidytags-storage";

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    pub written_at: DateTime<Utc>,
}

/// Run-scoped artifact directory: every file lands under `<root>/<run_id>/`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        run_id: Uuid,
        file_name: &str,
        value: &T,
    ) -> anyhow::Result<StoredArtifact> {
        let mut bytes = serde_json::to_vec_pretty(value)
            .with_context(|| format!("serializing artifact {file_name}"))?;
        bytes.push(b'\n');
        self.write_bytes(run_id, file_name, &bytes).await
    }

    pub async fn write_bytes(
        &self,
        run_id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredArtifact> {
        let relative_path = PathBuf::from(run_id.to_string()).join(file_name);
        let absolute_path = self.root.join(&relative_path);
        let parent = self.run_dir(run_id);

        fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("creating artifact directory {}", parent.display()))?;

        let temp_path = parent.join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp artifact file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp artifact file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp artifact file {}", temp_path.display()))?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &absolute_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "atomically renaming temp artifact {} -> {}",
                    temp_path.display(),
                    absolute_path.display()
                )
            });
        }

        let content_hash = Self::sha256_hex(bytes);
        tracing::info!(
            artifact = %relative_path.display(),
            sha256 = %content_hash,
            bytes = bytes.len(),
            "artifact written"
        );

        Ok(StoredArtifact {
            content_hash,
            relative_path,
            absolute_path,
            byte_size: bytes.len(),
            written_at: Utc::now(),
        })
    }
}
