//! Target packager: copies the stamped checkout into an isolated branch
//! directory and invokes the external packaging tool there. One artifact
//! per target; branches share no mutable state.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::{BuildTarget, PackagerConfig};
use crate::error::PackageBuildError;
use crate::store::Artifact;

pub struct Packager {
    config: PackagerConfig,
}

impl Packager {
    pub fn new(config: PackagerConfig) -> Self {
        Self { config }
    }

    /// Runs one packaging branch: isolates the checkout under `branch_dir`,
    /// invokes the templated tool, and collects the single produced file as
    /// a platform-tagged artifact.
    pub async fn package(
        &self,
        target: &BuildTarget,
        checkout: &Path,
        branch_dir: &Path,
        version: &str,
    ) -> Result<Artifact, PackageBuildError> {
        let source_dir = branch_dir.join("source");
        let out_dir = branch_dir.join("out");

        if branch_dir.exists() {
            fs::remove_dir_all(branch_dir).map_err(|e| PackageBuildError::Io {
                path: branch_dir.to_path_buf(),
                source: e,
            })?;
        }
        copy_tree(checkout, &source_dir)?;
        fs::create_dir_all(&out_dir).map_err(|e| PackageBuildError::Io {
            path: out_dir.clone(),
            source: e,
        })?;

        let command = self.substitute(&self.config.command, target, &source_dir, &out_dir, version);
        let args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| self.substitute(arg, target, &source_dir, &out_dir, version))
            .collect();

        info!(
            branch = %target.label(),
            command = %command,
            "Invoking packaging tool"
        );
        let status = Command::new(&command)
            .args(&args)
            .current_dir(&source_dir)
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PackageBuildError::ToolchainMissing {
                        command: command.clone(),
                    }
                } else {
                    PackageBuildError::Spawn {
                        command: command.clone(),
                        source: e,
                    }
                }
            })?;
        if !status.success() {
            error!(
                branch = %target.label(),
                command = %command,
                status = ?status,
                "Packaging tool failed"
            );
            return Err(PackageBuildError::ToolFailed {
                command,
                status,
                target: target.label(),
            });
        }

        let produced = self.collect_output(&out_dir)?;
        let payload = fs::read(&produced).map_err(|e| PackageBuildError::Io {
            path: produced.clone(),
            source: e,
        })?;
        let name = self.artifact_name(target, version, &produced);
        debug!(
            branch = %target.label(),
            artifact = %name,
            size = payload.len(),
            "Collected packaging output"
        );
        Ok(Artifact::from_payload(name, payload, target.clone()))
    }

    fn substitute(
        &self,
        template: &str,
        target: &BuildTarget,
        source_dir: &Path,
        out_dir: &Path,
        version: &str,
    ) -> String {
        template
            .replace("{source_dir}", &source_dir.to_string_lossy())
            .replace("{out_dir}", &out_dir.to_string_lossy())
            .replace("{version}", version)
            .replace("{platform_tag}", &target.platform_tag)
            .replace("{runtime_version}", &target.runtime_version)
    }

    /// The tool must leave exactly one file in the output directory.
    fn collect_output(&self, out_dir: &Path) -> Result<PathBuf, PackageBuildError> {
        let mut files = Vec::new();
        let entries = fs::read_dir(out_dir).map_err(|e| PackageBuildError::Io {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| PackageBuildError::Io {
                path: out_dir.to_path_buf(),
                source: e,
            })?;
            if entry.path().is_file() {
                files.push(entry.path());
            }
        }
        match files.len() {
            0 => Err(PackageBuildError::NoArtifact {
                out_dir: out_dir.to_path_buf(),
            }),
            1 => Ok(files.remove(0)),
            count => Err(PackageBuildError::AmbiguousArtifact {
                out_dir: out_dir.to_path_buf(),
                count,
            }),
        }
    }

    /// `<package>-<version>-<runtime>-<platform><ext>`, keeping the tool's
    /// output extension.
    fn artifact_name(&self, target: &BuildTarget, version: &str, produced: &Path) -> String {
        let extension = produced
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        format!(
            "{}-{}-{}-{}{}",
            self.config.package_name, version, target.runtime_version, target.platform_tag, extension
        )
    }
}

/// Recursive copy of the checkout into the branch source directory.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), PackageBuildError> {
    fs::create_dir_all(dst).map_err(|e| PackageBuildError::Io {
        path: dst.to_path_buf(),
        source: e,
    })?;
    let entries = fs::read_dir(src).map_err(|e| PackageBuildError::Io {
        path: src.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| PackageBuildError::Io {
            path: src.to_path_buf(),
            source: e,
        })?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| PackageBuildError::Io {
                path: from.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}
