use std::fs;
use std::path::Path;

use assert_cmd::Command as AssertCommand;
use predicates::prelude::*;
use tempfile::tempdir;

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .status()
        .expect("git should be runnable");
    assert!(status.success(), "git {:?} failed in {}", args, dir.display());
}

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

fn write_config(path: &Path, origin: &Path, work_dir: &Path) {
    let yaml = format!(
        r#"
work_dir: {work}
fetch:
  repository: {origin}
stamp:
  metadata_file: pkg.toml
  version_pattern: 'version\s*=\s*"([^"]+)"'
packager:
  command: sh
  args: ["-c", "cp pkg.toml '{{out_dir}}/demo.whl'"]
  package_name: demo
targets:
  - platform_tag: linux_x86_64
    runtime_version: py3.10
channel:
  type: registry
  index_url: https://registry.example/packages
"#,
        work = work_dir.display(),
        origin = origin.display(),
    );
    fs::write(path, yaml).expect("writing config failed");
}

#[test]
fn dry_run_happy_flow_prints_the_report() {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    init_origin(&origin);
    let config_path = root.path().join("pipeline.yaml");
    write_config(&config_path, &origin, &root.path().join("work"));

    let mut cmd = AssertCommand::cargo_bin("wheelhouse").expect("binary exists");
    cmd.arg("run")
        .arg("--config")
        .arg(&config_path)
        .arg("--source-ref")
        .arg("v1.2.3")
        .arg("--package-version")
        .arg("1.2.3");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Pipeline complete"))
        .stdout(predicate::str::contains("demo-1.2.3-py3.10-linux_x86_64.whl"));

    // Dry run: the artifact exists locally, nothing was published.
    assert!(root
        .path()
        .join("work")
        .join("artifacts")
        .join("demo-1.2.3-py3.10-linux_x86_64.whl")
        .exists());
}

#[test]
fn a_leading_v_in_the_version_is_rejected() {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    init_origin(&origin);
    let config_path = root.path().join("pipeline.yaml");
    write_config(&config_path, &origin, &root.path().join("work"));

    let mut cmd = AssertCommand::cargo_bin("wheelhouse").expect("binary exists");
    cmd.arg("run")
        .arg("--config")
        .arg(&config_path)
        .arg("--source-ref")
        .arg("v1.2.3")
        .arg("--package-version")
        .arg("v1.2.3");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("leading 'v'"));
}

#[test]
fn a_malformed_version_is_rejected() {
    let root = tempdir().unwrap();
    let origin = root.path().join("origin");
    init_origin(&origin);
    let config_path = root.path().join("pipeline.yaml");
    write_config(&config_path, &origin, &root.path().join("work"));

    let mut cmd = AssertCommand::cargo_bin("wheelhouse").expect("binary exists");
    cmd.arg("run")
        .arg("--config")
        .arg(&config_path)
        .arg("--source-ref")
        .arg("v1.2.3")
        .arg("--package-version")
        .arg("1.2");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("MAJOR.MINOR.BUILD"));
}

#[test]
fn a_missing_config_file_fails() {
    let mut cmd = AssertCommand::cargo_bin("wheelhouse").expect("binary exists");
    cmd.arg("run")
        .arg("--config")
        .arg("definitely/not/a/config.yaml")
        .arg("--source-ref")
        .arg("v1.2.3")
        .arg("--package-version")
        .arg("1.2.3");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}
