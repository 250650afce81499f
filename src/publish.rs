//! Publisher: conditionally ships the aggregated artifact set to a
//! distribution channel.
//!
//! The [`Publisher`] trait is the seam between the coordinator and the
//! concrete channels. Implementations connect to a package index or a
//! downstream packaging repository; the trait is annotated for `mockall` so
//! coordinator tests can assert publish behaviour (including "never called")
//! without a network.
//!
//! Publishing a version is one logical operation: a duplicate version must
//! fail loudly (`PublishError::Duplicate`), never silently re-release, and
//! no failure is retried automatically.

use std::env;
use std::fs;

use async_trait::async_trait;
#[allow(unused_imports)]
use mockall::automock;
use reqwest::StatusCode;
use tokio::process::Command;
use tracing::{error, info};

use crate::config::{ChannelConfig, IndexSelect};
use crate::error::PublishError;
use crate::store::Artifact;

/// Terminal outcome of the publish step. A dry run succeeds with no remote
/// location.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PublishOutcome {
    pub succeeded: bool,
    pub remote_location: Option<String>,
}

impl PublishOutcome {
    pub fn dry_run() -> Self {
        PublishOutcome {
            succeeded: true,
            remote_location: None,
        }
    }
}

/// Trait for shipping a version's artifact set to a distribution channel.
///
/// Implementors own transport, authentication, and idempotence checks. The
/// coordinator guarantees it only calls `publish` once all packaging
/// branches succeeded and the publish flag was set.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Uploads or commits every artifact for this version as a single
    /// logical release.
    async fn publish(
        &self,
        version: &str,
        artifacts: &[Artifact],
    ) -> Result<PublishOutcome, PublishError>;
}

/// Environment variable carrying the registry bearer token. Injected
/// externally; never logged.
pub const REGISTRY_TOKEN_VAR: &str = "WHEELHOUSE_REGISTRY_TOKEN";

/// Constructs the publisher for the configured channel. Registry channels
/// read their credential from the environment here, so a dry run never
/// requires a token.
pub fn for_channel(
    channel: &ChannelConfig,
    package_name: &str,
) -> Result<Box<dyn Publisher>, PublishError> {
    match channel {
        ChannelConfig::Registry {
            index_url,
            test_index_url,
            index,
        } => {
            let index_url = match index {
                IndexSelect::Release => index_url.clone(),
                IndexSelect::Test => test_index_url.clone().ok_or_else(|| {
                    PublishError::Misconfigured(
                        "test index selected but test_index_url is not set".to_string(),
                    )
                })?,
            };
            Ok(Box::new(RegistryPublisher::from_env(
                index_url,
                package_name.to_string(),
            )?))
        }
        ChannelConfig::Tag {
            packaging_repo,
            branch,
        } => Ok(Box::new(GitTagPublisher::new(
            packaging_repo.clone(),
            branch.clone(),
            package_name.to_string(),
        ))),
    }
}

/// HTTP package index channel. Artifacts are uploaded under
/// `<index>/<package>/<version>/<artifact-name>` with a bearer token.
#[derive(Debug)]
pub struct RegistryPublisher {
    client: reqwest::Client,
    index_url: String,
    package: String,
    token: String,
}

impl RegistryPublisher {
    /// Reads the bearer token from [`REGISTRY_TOKEN_VAR`] (a `.env` file is
    /// honoured, as elsewhere).
    pub fn from_env(index_url: String, package: String) -> Result<Self, PublishError> {
        dotenvy::dotenv().ok();
        let token = env::var(REGISTRY_TOKEN_VAR).map_err(|_| PublishError::MissingCredential {
            variable: REGISTRY_TOKEN_VAR,
        })?;
        info!(
            index_url = %index_url,
            package = %package,
            token_set = !token.is_empty(),
            "Initialized registry publisher"
        );
        Ok(RegistryPublisher {
            client: reqwest::Client::new(),
            index_url,
            package,
            token,
        })
    }

    /// `<index>/<package>/<version>`, the release's remote location.
    pub fn release_location(&self, version: &str) -> String {
        format!(
            "{}/{}/{}",
            self.index_url.trim_end_matches('/'),
            self.package,
            version
        )
    }
}

#[async_trait]
impl Publisher for RegistryPublisher {
    async fn publish(
        &self,
        version: &str,
        artifacts: &[Artifact],
    ) -> Result<PublishOutcome, PublishError> {
        let release_url = self.release_location(version);

        // Preflight: a release that already exists must fail loudly.
        let probe = self
            .client
            .get(&release_url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        match probe.status() {
            StatusCode::NOT_FOUND => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(PublishError::Auth {
                    channel: "registry",
                });
            }
            status if status.is_success() => {
                error!(version = %version, url = %release_url, "Version already published");
                return Err(PublishError::Duplicate {
                    version: version.to_string(),
                    channel: "registry",
                });
            }
            status => {
                return Err(PublishError::Rejected {
                    what: format!("version probe for {version}"),
                    reason: status.to_string(),
                });
            }
        }

        for artifact in artifacts {
            let url = format!("{}/{}", release_url, artifact.name);
            info!(artifact = %artifact.name, url = %url, "Uploading artifact");
            let response = self
                .client
                .put(&url)
                .bearer_auth(&self.token)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(artifact.payload.clone())
                .send()
                .await?;
            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(PublishError::Auth {
                        channel: "registry",
                    });
                }
                status if !status.is_success() => {
                    error!(artifact = %artifact.name, status = %status, "Registry rejected artifact");
                    return Err(PublishError::Rejected {
                        what: artifact.name.clone(),
                        reason: status.to_string(),
                    });
                }
                _ => {}
            }
        }

        info!(version = %version, url = %release_url, count = artifacts.len(), "Published release to registry");
        Ok(PublishOutcome {
            succeeded: true,
            remote_location: Some(release_url),
        })
    }
}

/// Downstream packaging repository channel: commits the artifact payloads
/// and pushes a `v<version>` tag. Push authentication (SSH key or helper)
/// comes from the ambient git configuration, as with any release bot.
pub struct GitTagPublisher {
    packaging_repo: String,
    branch: String,
    package: String,
}

impl GitTagPublisher {
    pub fn new(packaging_repo: String, branch: String, package: String) -> Self {
        Self {
            packaging_repo,
            branch,
            package,
        }
    }

    async fn run_git(&self, operation: &'static str, args: &[&str]) -> Result<(), PublishError> {
        let status = Command::new("git")
            .args(args)
            .status()
            .await
            .map_err(PublishError::GitSpawn)?;
        if !status.success() {
            error!(operation, status = ?status, "git command failed");
            return Err(PublishError::Git { operation, status });
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for GitTagPublisher {
    async fn publish(
        &self,
        version: &str,
        artifacts: &[Artifact],
    ) -> Result<PublishOutcome, PublishError> {
        let tag = format!("v{version}");
        let staging = tempfile::tempdir()?;
        let clone_dir = staging.path().join("packaging");
        let clone_path = clone_dir.to_string_lossy().to_string();

        self.run_git(
            "clone",
            &[
                "clone",
                "--branch",
                &self.branch,
                &self.packaging_repo,
                &clone_path,
            ],
        )
        .await?;

        // Idempotence: an existing v<version> tag means this release is done.
        let existing = Command::new("git")
            .args(["-C", &clone_path, "tag", "--list", &tag])
            .output()
            .await
            .map_err(PublishError::GitSpawn)?;
        if !String::from_utf8_lossy(&existing.stdout).trim().is_empty() {
            error!(tag = %tag, "Tag already exists in packaging repository");
            return Err(PublishError::Duplicate {
                version: version.to_string(),
                channel: "tag",
            });
        }

        for artifact in artifacts {
            let dest = clone_dir.join(&artifact.name);
            fs::write(&dest, &artifact.payload)?;
        }

        let message = format!("Release {} {}", self.package, version);
        self.run_git("add", &["-C", &clone_path, "add", "-A"]).await?;
        self.run_git(
            "commit",
            &[
                "-c",
                "user.name=wheelhouse",
                "-c",
                "user.email=wheelhouse@localhost",
                "-C",
                &clone_path,
                "commit",
                "-m",
                &message,
            ],
        )
        .await?;
        self.run_git("tag", &["-C", &clone_path, "tag", &tag]).await?;
        self.run_git(
            "push",
            &["-C", &clone_path, "push", "origin", &self.branch],
        )
        .await?;
        self.run_git("push-tag", &["-C", &clone_path, "push", "origin", &tag])
            .await?;

        info!(tag = %tag, repo = %self.packaging_repo, count = artifacts.len(), "Pushed release commit and tag");
        Ok(PublishOutcome {
            succeeded: true,
            remote_location: Some(tag),
        })
    }
}
