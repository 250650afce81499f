//! Name-keyed artifact store: the explicit handoff point between the
//! packaging fan-out and the publisher. Payloads are persisted under the
//! store root and indexed by artifact name.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::BuildTarget;
use crate::error::StoreError;

/// A named, immutable binary output of one packaging branch.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub payload: Vec<u8>,
    pub content_hash: String,
    pub origin: BuildTarget,
}

impl Artifact {
    /// Builds an artifact from a raw payload, computing its SHA256 hash.
    pub fn from_payload(name: String, payload: Vec<u8>, origin: BuildTarget) -> Self {
        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&payload);
            format!("{:x}", hasher.finalize())
        };
        Artifact {
            name,
            payload,
            content_hash,
            origin,
        }
    }
}

/// Directory-backed store with put/get contracts. A run opens it fresh;
/// duplicate names are rejected rather than overwritten.
pub struct ArtifactStore {
    root: PathBuf,
    artifacts: Vec<Artifact>,
}

impl ArtifactStore {
    /// Opens the store at `root`, clearing any previous run's contents so
    /// repeated runs produce identical trees.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        if root.exists() {
            fs::remove_dir_all(root).map_err(|e| StoreError::Io {
                path: root.to_path_buf(),
                source: e,
            })?;
        }
        fs::create_dir_all(root).map_err(|e| StoreError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        debug!(root = %root.display(), "Opened artifact store");
        Ok(ArtifactStore {
            root: root.to_path_buf(),
            artifacts: Vec::new(),
        })
    }

    /// Persists the artifact payload under its name and records it.
    pub fn put(&mut self, artifact: Artifact) -> Result<(), StoreError> {
        if self.artifacts.iter().any(|a| a.name == artifact.name) {
            return Err(StoreError::DuplicateName {
                name: artifact.name,
            });
        }
        let path = self.root.join(&artifact.name);
        fs::write(&path, &artifact.payload).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        info!(
            name = %artifact.name,
            size = artifact.payload.len(),
            content_hash = %artifact.content_hash,
            "Stored artifact"
        );
        self.artifacts.push(artifact);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    pub fn list(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
