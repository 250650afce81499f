//! `load_config`: loads and validates the static YAML pipeline
//! configuration. This is the only place where untrusted YAML is parsed and
//! mapped onto the strongly-typed [`PipelineConfig`].
//!
//! Secrets are never part of the YAML file: the registry token is injected
//! from the environment when the publisher is constructed (see `publish`).
//! All errors here use `anyhow` for context-rich diagnostics surfaced at the
//! CLI boundary.

use std::fs;
use std::path::Path;

use anyhow::Result;
use regex::Regex;
use tracing::{error, info};

use crate::config::{ChannelConfig, IndexSelect, PipelineConfig};

/// Loads the YAML pipeline configuration from `path` and validates it.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading pipeline configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: PipelineConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => conf,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    validate(&config)?;
    config.trace_loaded();
    Ok(config)
}

fn validate(config: &PipelineConfig) -> Result<()> {
    if config.targets.is_empty() {
        return Err(anyhow::anyhow!("config declares no build targets"));
    }

    let mut labels: Vec<String> = config.targets.iter().map(|t| t.label()).collect();
    labels.sort();
    labels.dedup();
    if labels.len() != config.targets.len() {
        return Err(anyhow::anyhow!(
            "build target labels must be unique (platform_tag plus runtime_version)"
        ));
    }

    if config.packager.command.trim().is_empty() {
        return Err(anyhow::anyhow!("packager command must not be empty"));
    }

    if let Err(e) = Regex::new(&config.stamp.version_pattern) {
        return Err(anyhow::anyhow!(
            "stamp.version_pattern is not a valid regex: {e}"
        ));
    }

    if let ChannelConfig::Registry {
        test_index_url,
        index,
        ..
    } = &config.channel
    {
        if *index == IndexSelect::Test && test_index_url.is_none() {
            return Err(anyhow::anyhow!(
                "channel selects the test index but test_index_url is not set"
            ));
        }
    }

    Ok(())
}
