use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;
use wheelhouse::config::{ArtifactRef, FetchConfig, PipelineRequest};
use wheelhouse::error::FetchError;
use wheelhouse::fetch::Fetcher;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .status()
        .expect("git should be runnable");
    assert!(status.success(), "git {:?} failed in {}", args, dir.display());
}

/// Creates a local origin repository with one commit and a v1.2.3 tag.
fn init_origin(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init"]);
    git(dir, &["checkout", "-b", "main"]);
    fs::write(
        dir.join("pkg.toml"),
        "name = \"demo\"\nversion = \"0.0.0\"\n",
    )
    .unwrap();
    git(dir, &["add", "-A"]);
    git(
        dir,
        &[
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@localhost",
            "commit",
            "-m",
            "initial",
        ],
    );
    git(dir, &["tag", "v1.2.3"]);
}

fn request(origin: &Path, reference: &str) -> PipelineRequest {
    PipelineRequest {
        repository: origin.to_string_lossy().to_string(),
        source_ref: reference.to_string(),
        package_version: "1.2.3".to_string(),
        publish: false,
    }
}

#[tokio::test]
async fn fetches_a_tagged_ref_into_a_clean_checkout() {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    init_origin(&origin);

    let dest = root.path().join("work").join("checkout");
    // Pre-populate the destination to prove it is cleaned first.
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("stale.txt"), b"stale").unwrap();

    let fetcher = Fetcher::new(FetchConfig {
        repository: origin.to_string_lossy().to_string(),
        prebuilt: vec![],
        prebuilt_dir: "prebuilt".into(),
    });
    let checkout = fetcher
        .fetch(&request(&origin, "v1.2.3"), &dest)
        .await
        .expect("fetch should succeed");

    assert_eq!(checkout.root, dest);
    assert!(dest.join("pkg.toml").exists());
    assert!(!dest.join("stale.txt").exists());
}

#[tokio::test]
async fn a_missing_ref_is_a_fetch_error() {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    init_origin(&origin);

    let fetcher = Fetcher::new(FetchConfig {
        repository: origin.to_string_lossy().to_string(),
        prebuilt: vec![],
        prebuilt_dir: "prebuilt".into(),
    });
    let err = fetcher
        .fetch(&request(&origin, "v9.9.9"), &root.path().join("checkout"))
        .await
        .expect_err("unknown ref must fail");
    match err {
        FetchError::Git { operation, .. } => assert_eq!(operation, "checkout"),
        other => panic!("expected a git checkout failure, got {other:?}"),
    }
}

#[tokio::test]
async fn a_missing_repository_is_a_fetch_error() {
    let root = tempdir().unwrap();
    let missing = root.path().join("no-such-origin");

    let fetcher = Fetcher::new(FetchConfig {
        repository: missing.to_string_lossy().to_string(),
        prebuilt: vec![],
        prebuilt_dir: "prebuilt".into(),
    });
    let err = fetcher
        .fetch(&request(&missing, "main"), &root.path().join("checkout"))
        .await
        .expect_err("unknown repository must fail");
    match err {
        FetchError::Git { operation, .. } => assert_eq!(operation, "clone"),
        other => panic!("expected a git clone failure, got {other:?}"),
    }
}

#[tokio::test]
async fn prebuilt_path_inputs_are_resolved_into_the_checkout() {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    init_origin(&origin);

    let binary = root.path().join("libdemo.so");
    fs::write(&binary, b"elf bytes").unwrap();

    let fetcher = Fetcher::new(FetchConfig {
        repository: origin.to_string_lossy().to_string(),
        prebuilt: vec![ArtifactRef::Path {
            name: "libdemo.so".to_string(),
            path: binary,
        }],
        prebuilt_dir: "prebuilt".into(),
    });
    let dest = root.path().join("checkout");
    let checkout = fetcher
        .fetch(&request(&origin, "v1.2.3"), &dest)
        .await
        .expect("fetch should succeed");

    assert_eq!(checkout.prebuilt.len(), 1);
    let (name, path) = &checkout.prebuilt[0];
    assert_eq!(name, "libdemo.so");
    assert_eq!(fs::read(path).unwrap(), b"elf bytes");
    assert_eq!(path, &dest.join("prebuilt").join("libdemo.so"));
}

#[tokio::test]
async fn an_unresolvable_prebuilt_name_is_a_fetch_error() {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    init_origin(&origin);

    let fetcher = Fetcher::new(FetchConfig {
        repository: origin.to_string_lossy().to_string(),
        prebuilt: vec![ArtifactRef::Path {
            name: "libdemo.so".to_string(),
            path: root.path().join("absent.so"),
        }],
        prebuilt_dir: "prebuilt".into(),
    });
    let err = fetcher
        .fetch(&request(&origin, "v1.2.3"), &root.path().join("checkout"))
        .await
        .expect_err("missing prebuilt input must fail");
    match err {
        FetchError::UnresolvedArtifact { name, .. } => assert_eq!(name, "libdemo.so"),
        other => panic!("expected an unresolved artifact error, got {other:?}"),
    }
}
