//! Artifact fetcher: resolves (repository, ref) into a local checkout and
//! pulls the named prebuilt inputs into it. No side effects beyond local
//! filesystem population.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{ArtifactRef, FetchConfig, PipelineRequest};
use crate::error::FetchError;

/// A resolved source tree plus the prebuilt inputs placed inside it.
#[derive(Debug)]
pub struct Checkout {
    pub root: PathBuf,
    /// (name, path) of every resolved prebuilt input.
    pub prebuilt: Vec<(String, PathBuf)>,
}

pub struct Fetcher {
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Clones the requested repository at the requested ref into `dest` and
    /// resolves every configured prebuilt input. An existing `dest` is
    /// removed first so every run starts from a clean tree.
    pub async fn fetch(
        &self,
        request: &PipelineRequest,
        dest: &Path,
    ) -> Result<Checkout, FetchError> {
        if dest.exists() {
            fs::remove_dir_all(dest).map_err(|e| FetchError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;
            debug!(path = %dest.display(), "Removed existing checkout");
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        self.clone_and_checkout(request, dest).await?;

        let prebuilt_root = dest.join(&self.config.prebuilt_dir);
        let mut prebuilt = Vec::new();
        for artifact_ref in &self.config.prebuilt {
            let path = self.resolve_prebuilt(artifact_ref, &prebuilt_root).await?;
            prebuilt.push((artifact_ref.name().to_string(), path));
        }

        info!(
            repository = %request.repository,
            reference = %request.source_ref,
            path = %dest.display(),
            prebuilt = prebuilt.len(),
            "Fetched source tree"
        );
        Ok(Checkout {
            root: dest.to_path_buf(),
            prebuilt,
        })
    }

    async fn clone_and_checkout(
        &self,
        request: &PipelineRequest,
        dest: &Path,
    ) -> Result<(), FetchError> {
        let status = Command::new("git")
            .arg("clone")
            .arg(&request.repository)
            .arg(dest)
            .status()
            .await
            .map_err(FetchError::GitSpawn)?;
        if !status.success() {
            return Err(FetchError::Git {
                operation: "clone",
                status,
                repository: request.repository.clone(),
                reference: request.source_ref.clone(),
            });
        }
        debug!(repository = %request.repository, "Cloned source repository");

        // Checkout the requested reference (branch, tag, or commit SHA).
        let status = Command::new("git")
            .arg("-C")
            .arg(dest)
            .arg("checkout")
            .arg(&request.source_ref)
            .status()
            .await
            .map_err(FetchError::GitSpawn)?;
        if !status.success() {
            return Err(FetchError::Git {
                operation: "checkout",
                status,
                repository: request.repository.clone(),
                reference: request.source_ref.clone(),
            });
        }
        debug!(reference = %request.source_ref, "Checked out source ref");
        Ok(())
    }

    async fn resolve_prebuilt(
        &self,
        artifact_ref: &ArtifactRef,
        prebuilt_root: &Path,
    ) -> Result<PathBuf, FetchError> {
        fs::create_dir_all(prebuilt_root).map_err(|e| FetchError::Io {
            path: prebuilt_root.to_path_buf(),
            source: e,
        })?;

        match artifact_ref {
            ArtifactRef::Url { name, url } => {
                info!(name = %name, url = %url, "Downloading prebuilt input");
                let response = reqwest::get(url.as_str()).await.map_err(|e| {
                    FetchError::UnresolvedArtifact {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if !response.status().is_success() {
                    return Err(FetchError::UnresolvedArtifact {
                        name: name.clone(),
                        reason: format!("{} returned {}", url, response.status()),
                    });
                }
                let payload = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::UnresolvedArtifact {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                let target = prebuilt_root.join(name);
                fs::write(&target, &payload).map_err(|e| FetchError::Io {
                    path: target.clone(),
                    source: e,
                })?;
                Ok(target)
            }
            ArtifactRef::Path { name, path } => {
                if !path.exists() {
                    return Err(FetchError::UnresolvedArtifact {
                        name: name.clone(),
                        reason: format!("{} does not exist", path.display()),
                    });
                }
                let target = prebuilt_root.join(name);
                fs::copy(path, &target).map_err(|e| FetchError::Io {
                    path: target.clone(),
                    source: e,
                })?;
                debug!(name = %name, from = %path.display(), "Copied prebuilt input");
                Ok(target)
            }
        }
    }
}
