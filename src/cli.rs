//! CLI glue for wheelhouse: command parsing, request validation, and the
//! async entrypoint shared by `main` and the integration tests. All
//! pipeline logic lives in the library modules; this module only wires
//! flags into a [`PipelineRequest`] and picks the channel publisher.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::PipelineRequest;
use crate::load_config::load_config;
use crate::pipeline::run_pipeline;
use crate::publish::{self, Publisher};

/// CLI for wheelhouse: build and publish platform-tagged release artifacts.
#[derive(Parser)]
#[clap(
    name = "wheelhouse",
    version,
    about = "Fetch a source ref, stamp the version, build per-target artifacts and publish them"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the release pipeline described by the given config file
    Run {
        /// Path to the YAML pipeline config file
        #[clap(long)]
        config: PathBuf,
        /// Source repository override (defaults to the configured one)
        #[clap(long)]
        repository: Option<String>,
        /// Commit, tag or branch to build
        #[clap(long)]
        source_ref: String,
        /// Release version, MAJOR.MINOR.BUILD without a leading 'v'
        #[clap(long)]
        package_version: String,
        /// Publish the artifacts; without this flag the run is a dry run
        #[clap(long)]
        publish: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            repository,
            source_ref,
            package_version,
            publish,
        } => {
            let config = load_config(config)?;
            let request = PipelineRequest::new(
                repository,
                &config,
                source_ref,
                package_version,
                publish,
            )?;
            tracing::info!(command = "run", publish = request.publish, "Starting release pipeline");

            // The channel publisher (and its credential) is only needed for
            // a publishing run; dry runs never touch it.
            let publisher: Option<Box<dyn Publisher>> = if request.publish {
                Some(publish::for_channel(
                    &config.channel,
                    &config.packager.package_name,
                )?)
            } else {
                None
            };

            match run_pipeline(&config, &request, publisher.as_deref()).await {
                Ok(report) => {
                    tracing::info!(command = "run", run_id = %report.run_id, "Pipeline complete");
                    println!("Pipeline complete.\nReport:");
                    println!("{:#?}", report);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "run", error = %e, "Pipeline failed");
                    Err(e.into())
                }
            }
        }
    }
}
