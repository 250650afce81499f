use std::fs;

use tempfile::tempdir;
use wheelhouse::error::MetadataFormatError;
use wheelhouse::stamp::stamp_version;

const PATTERN: &str = r#"version\s*=\s*"([^"]+)""#;

#[test]
fn replaces_only_the_version_field() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pkg.toml");
    let original = "name = \"demo\"\nversion = \"0.0.0\"\n\n[metadata]\nnote = \"version = \"\n";
    fs::write(&path, original).unwrap();

    let outcome = stamp_version(&path, PATTERN, "1.2.3").expect("stamp should succeed");
    assert_eq!(outcome.previous, "0.0.0");

    let stamped = fs::read_to_string(&path).unwrap();
    let expected = "name = \"demo\"\nversion = \"1.2.3\"\n\n[metadata]\nnote = \"version = \"\n";
    assert_eq!(stamped, expected, "every byte outside the field must survive");
}

#[test]
fn stamping_is_idempotent_for_the_same_version() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pkg.toml");
    fs::write(&path, "version = \"0.0.0\"\n").unwrap();

    stamp_version(&path, PATTERN, "2.0.1").unwrap();
    let first = fs::read(&path).unwrap();
    stamp_version(&path, PATTERN, "2.0.1").unwrap();
    let second = fs::read(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn whole_match_is_replaced_when_pattern_has_no_group() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("version.txt");
    fs::write(&path, "build 0.0.0-dev\n").unwrap();

    stamp_version(&path, r"0\.0\.0-dev", "3.1.4").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "build 3.1.4\n");
}

#[test]
fn missing_field_is_a_metadata_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pkg.toml");
    fs::write(&path, "name = \"demo\"\n").unwrap();

    let err = stamp_version(&path, PATTERN, "1.2.3").expect_err("no field, must fail");
    assert!(matches!(err, MetadataFormatError::FieldNotFound { .. }));
    // The file must be untouched on failure.
    assert_eq!(fs::read_to_string(&path).unwrap(), "name = \"demo\"\n");
}

#[test]
fn non_utf8_metadata_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pkg.bin");
    fs::write(&path, [0xff, 0xfe, 0x00, 0x01]).unwrap();

    let err = stamp_version(&path, PATTERN, "1.2.3").expect_err("binary file must fail");
    assert!(matches!(err, MetadataFormatError::NotUtf8 { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = stamp_version(&path, PATTERN, "1.2.3").expect_err("missing file must fail");
    assert!(matches!(err, MetadataFormatError::Io { .. }));
}
