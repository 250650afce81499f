//! Version stamper: rewrites the version field of a metadata file in place,
//! preserving every other byte.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::info;

use crate::error::MetadataFormatError;

/// What the stamper found and replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampOutcome {
    pub previous: String,
}

/// Replaces the version span located by `version_pattern` in
/// `metadata_file` with `version`. Capture group 1 marks the span when
/// present, the whole match otherwise. Only the first occurrence is
/// rewritten; the rest of the file is untouched.
pub fn stamp_version(
    metadata_file: &Path,
    version_pattern: &str,
    version: &str,
) -> Result<StampOutcome, MetadataFormatError> {
    let raw = fs::read(metadata_file).map_err(|e| MetadataFormatError::Io {
        path: metadata_file.to_path_buf(),
        source: e,
    })?;
    let content = String::from_utf8(raw).map_err(|_| MetadataFormatError::NotUtf8 {
        path: metadata_file.to_path_buf(),
    })?;

    let pattern = Regex::new(version_pattern)?;
    let captures = pattern
        .captures(&content)
        .ok_or_else(|| MetadataFormatError::FieldNotFound {
            path: metadata_file.to_path_buf(),
        })?;
    let span = match captures.get(1) {
        Some(group) => group,
        None => captures
            .get(0)
            .ok_or_else(|| MetadataFormatError::FieldNotFound {
                path: metadata_file.to_path_buf(),
            })?,
    };

    let previous = span.as_str().to_string();
    let mut stamped = String::with_capacity(content.len() + version.len());
    stamped.push_str(&content[..span.start()]);
    stamped.push_str(version);
    stamped.push_str(&content[span.end()..]);

    fs::write(metadata_file, stamped).map_err(|e| MetadataFormatError::Io {
        path: metadata_file.to_path_buf(),
        source: e,
    })?;

    info!(
        path = %metadata_file.display(),
        previous = %previous,
        version = %version,
        "Stamped package version"
    );
    Ok(StampOutcome { previous })
}
