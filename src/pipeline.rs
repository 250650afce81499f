//! Pipeline coordinator: sequences fetch → stamp → packaging fan-out →
//! aggregation → publish for one release request.
//!
//! The run walks an explicit state machine:
//! `Fetching → Stamping → Packaging → Aggregating → Publishing → Done`,
//! with `Failed` as the terminal state of any error path. The source tree
//! is fetched and stamped once; every packaging branch then works on its
//! own isolated copy, so branches share no mutable state. The publisher
//! runs only when every branch succeeded and the request asked for it —
//! a dry run is a first-class terminal outcome, not a scattered
//! conditional.
//!
//! # Error handling
//! Each failed step returns immediately with its component error wrapped in
//! [`PipelineError`]; branch failures are aggregated after the fan-out
//! barrier so in-flight siblings finish (their outputs are discarded).
//!
//! # Callable from
//! The CLI crate and the integration tests; tests pass a
//! `MockPublisher` to observe publish behaviour.

use std::fs;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{BuildTarget, PipelineConfig, PipelineRequest};
use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::package::Packager;
use crate::publish::{PublishOutcome, Publisher};
use crate::stamp::stamp_version;
use crate::store::{Artifact, ArtifactStore};

/// Coarse pipeline phase, logged on every transition and recorded in the
/// final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Fetching,
    Stamping,
    Packaging,
    Aggregating,
    Publishing,
    Done,
    Failed,
}

/// Per-target entry of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: BuildTarget,
    pub artifact: String,
    pub content_hash: String,
    pub size: usize,
}

/// Audit report for one pipeline run.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub state: PipelineState,
    pub version: String,
    pub targets: Vec<TargetReport>,
    pub publish: Option<PublishOutcome>,
}

fn transition(run_id: &str, state: PipelineState) {
    info!(run_id = %run_id, state = ?state, "Pipeline state transition");
}

/// Runs the full pipeline for one request. `publisher` may be `None` for a
/// dry run; a publishing request without a publisher is rejected before any
/// work starts.
pub async fn run_pipeline(
    config: &PipelineConfig,
    request: &PipelineRequest,
    publisher: Option<&dyn Publisher>,
) -> Result<PipelineReport, PipelineError> {
    let run_id = Uuid::new_v4().to_string();
    info!(
        run_id = %run_id,
        repository = %request.repository,
        reference = %request.source_ref,
        version = %request.package_version,
        publish = request.publish,
        "Starting release pipeline"
    );

    if request.publish && publisher.is_none() {
        return Err(PipelineError::InvalidRequest(
            "publish requested but no channel publisher was constructed".to_string(),
        ));
    }

    // --- Fetching: one pristine checkout for the whole run ---
    transition(&run_id, PipelineState::Fetching);
    let checkout_dir = config.work_dir.join("checkout");
    let fetcher = Fetcher::new(config.fetch.clone());
    let checkout = match fetcher.fetch(request, &checkout_dir).await {
        Ok(checkout) => checkout,
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Fetch failed");
            transition(&run_id, PipelineState::Failed);
            return Err(e.into());
        }
    };

    // --- Stamping: rewrite the version before any branch copies the tree ---
    transition(&run_id, PipelineState::Stamping);
    let metadata_path = checkout.root.join(&config.stamp.metadata_file);
    match stamp_version(
        &metadata_path,
        &config.stamp.version_pattern,
        &request.package_version,
    ) {
        Ok(outcome) => info!(
            run_id = %run_id,
            previous = %outcome.previous,
            "Version stamped"
        ),
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Stamping failed");
            transition(&run_id, PipelineState::Failed);
            return Err(e.into());
        }
    }

    // --- Packaging: one isolated branch per target, all in flight at once ---
    transition(&run_id, PipelineState::Packaging);
    let packager = Packager::new(config.packager.clone());
    let targets_root = config.work_dir.join("targets");
    let jobs = config.targets.iter().map(|target| {
        let packager = &packager;
        let checkout_root = checkout.root.clone();
        let branch_dir = targets_root.join(target.label());
        async move {
            match packager
                .package(target, &checkout_root, &branch_dir, &request.package_version)
                .await
            {
                Ok(artifact) => {
                    info!(branch = %target.label(), artifact = %artifact.name, "Packaging branch succeeded");
                    Ok(artifact)
                }
                Err(e) => {
                    error!(branch = %target.label(), error = %e, "Packaging branch failed");
                    Err((target.clone(), e))
                }
            }
        }
    });
    // join_all, not try_join_all: a failed branch must not cancel in-flight
    // siblings; their outputs are simply discarded below.
    let results = join_all(jobs).await;

    let total = results.len();
    let mut artifacts: Vec<Artifact> = Vec::new();
    let mut failures: Vec<String> = Vec::new();
    for result in results {
        match result {
            Ok(artifact) => artifacts.push(artifact),
            Err((target, e)) => failures.push(format!("{}: {}", target.label(), e)),
        }
    }
    if !failures.is_empty() {
        error!(
            run_id = %run_id,
            failed = failures.len(),
            total,
            "Packaging fan-out failed; publication skipped"
        );
        transition(&run_id, PipelineState::Failed);
        return Err(PipelineError::Packaging {
            failed: failures.len(),
            total,
            summary: failures.join("; "),
        });
    }

    // --- Aggregating: hand every artifact to the name-keyed store ---
    transition(&run_id, PipelineState::Aggregating);
    let mut store = ArtifactStore::open(&config.work_dir.join("artifacts"))?;
    let mut targets_report = Vec::new();
    for artifact in artifacts {
        targets_report.push(TargetReport {
            target: artifact.origin.clone(),
            artifact: artifact.name.clone(),
            content_hash: artifact.content_hash.clone(),
            size: artifact.payload.len(),
        });
        store.put(artifact)?;
    }

    // --- Publishing, or the dry-run terminal state ---
    let publish_outcome = if request.publish {
        transition(&run_id, PipelineState::Publishing);
        match publisher {
            Some(publisher) => {
                match publisher
                    .publish(&request.package_version, store.list())
                    .await
                {
                    Ok(outcome) => {
                        info!(run_id = %run_id, ?outcome, "Publish succeeded");
                        outcome
                    }
                    Err(e) => {
                        error!(run_id = %run_id, error = %e, "Publish failed");
                        transition(&run_id, PipelineState::Failed);
                        return Err(e.into());
                    }
                }
            }
            None => {
                // Checked before any work started.
                transition(&run_id, PipelineState::Failed);
                return Err(PipelineError::InvalidRequest(
                    "publish requested but no channel publisher was constructed".to_string(),
                ));
            }
        }
    } else {
        info!(run_id = %run_id, "Dry run: skipping publication");
        PublishOutcome::dry_run()
    };

    transition(&run_id, PipelineState::Done);
    let report = PipelineReport {
        run_id,
        state: PipelineState::Done,
        version: request.package_version.clone(),
        targets: targets_report,
        publish: Some(publish_outcome),
    };
    write_report(config, &report);
    Ok(report)
}

/// Best-effort JSON copy of the report next to the artifacts; failure to
/// write it never fails the run.
fn write_report(config: &PipelineConfig, report: &PipelineReport) {
    let path = config.work_dir.join("report.json");
    match serde_json::to_string_pretty(report) {
        Ok(json) => {
            if let Err(e) = fs::write(&path, json) {
                error!(error = ?e, path = %path.display(), "Failed to write run report");
            }
        }
        Err(e) => error!(error = ?e, "Failed to serialize run report"),
    }
}
