//! Strongly-typed pipeline configuration and the per-run request. All
//! components receive these structs explicitly; nothing reads ambient
//! process state except the secret injection in `load_config`/`publish`.

use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PipelineError;

/// One platform/runtime combination for which exactly one artifact is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    pub platform_tag: String,
    pub runtime_version: String,
}

impl BuildTarget {
    /// Stable label used for working directories and artifact names.
    pub fn label(&self) -> String {
        format!("{}-{}", self.platform_tag, self.runtime_version)
    }
}

/// Where the source tree comes from and which prebuilt inputs it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Default source repository; a request may override it.
    pub repository: String,
    /// Named prebuilt binaries resolved into the checkout before packaging.
    #[serde(default)]
    pub prebuilt: Vec<ArtifactRef>,
    /// Directory inside the checkout where prebuilt inputs land.
    #[serde(default = "default_prebuilt_dir")]
    pub prebuilt_dir: PathBuf,
}

fn default_prebuilt_dir() -> PathBuf {
    PathBuf::from("prebuilt")
}

/// A named reference to a prebuilt input, fetched by URL or copied from a
/// local path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArtifactRef {
    Url { name: String, url: String },
    Path { name: String, path: PathBuf },
}

impl ArtifactRef {
    pub fn name(&self) -> &str {
        match self {
            ArtifactRef::Url { name, .. } => name,
            ArtifactRef::Path { name, .. } => name,
        }
    }
}

/// Which metadata file carries the version field and how to find it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampConfig {
    /// Metadata file path, relative to the checkout root.
    pub metadata_file: PathBuf,
    /// Regex locating the version field. Capture group 1, when present,
    /// marks the span replaced by the requested version; otherwise the whole
    /// match is replaced.
    pub version_pattern: String,
}

/// External packaging tool invocation, templated per target.
///
/// Placeholders substituted into `command` and each arg:
/// `{source_dir}`, `{out_dir}`, `{version}`, `{platform_tag}`,
/// `{runtime_version}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Package name used in artifact names and remote locations.
    pub package_name: String,
}

/// Which index of the registry channel receives the release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSelect {
    #[default]
    Release,
    Test,
}

/// Distribution channel for the aggregated artifact set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// HTTP package index. `index` selects between the release and test
    /// index URLs.
    Registry {
        index_url: String,
        #[serde(default)]
        test_index_url: Option<String>,
        #[serde(default)]
        index: IndexSelect,
    },
    /// Downstream packaging repository that receives a commit plus a
    /// `v<version>` tag.
    Tag {
        packaging_repo: String,
        #[serde(default = "default_branch")]
        branch: String,
    },
}

fn default_branch() -> String {
    "main".to_string()
}

/// Full static pipeline configuration; everything except the per-run request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub work_dir: PathBuf,
    pub fetch: FetchConfig,
    pub stamp: StampConfig,
    pub packager: PackagerConfig,
    pub targets: Vec<BuildTarget>,
    pub channel: ChannelConfig,
}

impl PipelineConfig {
    pub fn trace_loaded(&self) {
        info!(
            work_dir = %self.work_dir.display(),
            targets = self.targets.len(),
            package = %self.packager.package_name,
            "Loaded pipeline configuration"
        );
        debug!(?self, "Pipeline configuration (full debug)");
    }
}

const VERSION_FORMAT: &str = r"^[0-9]+\.[0-9]+\.[0-9]+$";

/// Immutable per-run request, built once from CLI flags before the pipeline
/// starts.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub repository: String,
    pub source_ref: String,
    pub package_version: String,
    pub publish: bool,
}

impl PipelineRequest {
    /// Validates and freezes the request. The version must be
    /// MAJOR.MINOR.BUILD without a leading 'v'; the tag channel adds the
    /// prefix itself.
    pub fn new(
        repository: Option<String>,
        config: &PipelineConfig,
        source_ref: String,
        package_version: String,
        publish: bool,
    ) -> Result<Self, PipelineError> {
        if source_ref.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "source ref must not be empty".to_string(),
            ));
        }
        if package_version.starts_with('v') || package_version.starts_with('V') {
            return Err(PipelineError::InvalidRequest(format!(
                "package version '{package_version}' must not carry a leading 'v'"
            )));
        }
        let format = Regex::new(VERSION_FORMAT)
            .map_err(|e| PipelineError::InvalidRequest(format!("version format regex: {e}")))?;
        if !format.is_match(&package_version) {
            return Err(PipelineError::InvalidRequest(format!(
                "package version '{package_version}' is not MAJOR.MINOR.BUILD"
            )));
        }
        Ok(PipelineRequest {
            repository: repository.unwrap_or_else(|| config.fetch.repository.clone()),
            source_ref,
            package_version,
            publish,
        })
    }
}
