//! Error taxonomy for the pipeline: one enum per component, aggregated at
//! the coordinator boundary into [`PipelineError`].

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failures while resolving the source tree or named prebuilt inputs.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to launch git: {0}")]
    GitSpawn(#[source] std::io::Error),

    #[error("git {operation} exited with {status} (repository {repository}, ref {reference})")]
    Git {
        operation: &'static str,
        status: ExitStatus,
        repository: String,
        reference: String,
    },

    #[error("prebuilt artifact '{name}' could not be resolved: {reason}")]
    UnresolvedArtifact { name: String, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while rewriting the version field in package metadata.
#[derive(Debug, Error)]
pub enum MetadataFormatError {
    #[error("version field not found in {path}")]
    FieldNotFound { path: PathBuf },

    #[error("metadata file {path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },

    #[error("invalid version pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while running the external packaging tool for one build target.
#[derive(Debug, Error)]
pub enum PackageBuildError {
    #[error("packaging toolchain '{command}' not found on PATH")]
    ToolchainMissing { command: String },

    #[error("failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status} for target {target}")]
    ToolFailed {
        command: String,
        status: ExitStatus,
        target: String,
    },

    #[error("packager produced no output file in {out_dir}")]
    NoArtifact { out_dir: PathBuf },

    #[error("packager produced {count} output files in {out_dir}, expected exactly one")]
    AmbiguousArtifact { out_dir: PathBuf, count: usize },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures in the artifact store between aggregation and publishing.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an artifact named '{name}' is already stored; target labels must be unique")]
    DuplicateName { name: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while publishing the aggregated artifact set. None of these are
/// retried; the caller re-runs the pipeline after fixing the cause.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("authentication rejected by the {channel} channel")]
    Auth { channel: &'static str },

    #[error("version {version} is already published on the {channel} channel")]
    Duplicate {
        version: String,
        channel: &'static str,
    },

    #[error("remote rejected {what}: {reason}")]
    Rejected { what: String, reason: String },

    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to launch git: {0}")]
    GitSpawn(#[source] std::io::Error),

    #[error("git {operation} exited with {status}")]
    Git {
        operation: &'static str,
        status: ExitStatus,
    },

    #[error("missing credential: {variable} is not set")]
    MissingCredential { variable: &'static str },

    #[error("channel misconfigured: {0}")]
    Misconfigured(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level pipeline failure, surfaced to the CLI with a nonzero exit.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Metadata(#[from] MetadataFormatError),

    #[error("packaging failed for {failed} of {total} targets: {summary}")]
    Packaging {
        failed: usize,
        total: usize,
        summary: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
