//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod derive;
mod resolve;
#[cfg(feature = "server")]
mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{load_config, merge_cli_overrides, CliOverrides};
use crate::logging;
use crate::service::OembedService;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// oembed - Resolve resource URLs into oEmbed payloads
#[derive(Parser)]
#[command(name = "oembed")]
#[command(about = "Resolve locally hosted resource URLs into oEmbed payloads")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: nearest oembed.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Catalog file, overriding [catalog].path
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Public files directory, overriding [files].public_root
    #[arg(long, global = true)]
    pub public_root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one locator and print the payload as JSON
    Resolve {
        /// Resource URL, optionally with ?view_mode=<mode>
        locator: String,

        /// Print the cache tags, contexts and max-age with the payload
        #[arg(long)]
        cache: bool,
    },
    /// Resolve every locator in a file (one per line), printing JSON lines
    Batch {
        /// Input file, or - for stdin
        input: PathBuf,
    },
    /// Generate (or reuse) an image style derivative
    Derive {
        /// Image style or responsive image style ID
        style: String,

        /// Source file URI, e.g. public://example_1.jpeg
        uri: String,

        /// Treat the style as a responsive image style and use its fallback
        #[arg(long)]
        responsive: bool,
    },
    /// Decode a stored embed URL into resource UUID, type and view mode
    Inspect {
        /// Embed URL of the form {service_url}?url=<resource URL>
        embed_url: String,
    },
    /// Serve the oEmbed endpoint over HTTP
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind, overriding [server].host
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overriding [server].port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Entry point for the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let overrides = CliOverrides {
        catalog: cli.catalog.clone(),
        public_root: cli.public_root.clone(),
        ..server_overrides(&cli.command)
    };

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    merge_cli_overrides(&mut config, &overrides);

    let service = match OembedService::from_config(config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match cli.command {
        Commands::Resolve { locator, cache } => resolve::run_resolve(&service, &locator, cache),
        Commands::Batch { input } => resolve::run_batch(&service, &input),
        Commands::Derive { style, uri, responsive } => {
            derive::run_derive(&service, &style, &uri, responsive)
        }
        Commands::Inspect { embed_url } => resolve::run_inspect(&service, &embed_url),
        #[cfg(feature = "server")]
        Commands::Serve { .. } => serve::run_serve(&service),
    }
}

#[cfg(feature = "server")]
fn server_overrides(command: &Commands) -> CliOverrides {
    match command {
        Commands::Serve { host, port } => {
            CliOverrides { host: host.clone(), port: *port, ..Default::default() }
        }
        _ => CliOverrides::default(),
    }
}

#[cfg(not(feature = "server"))]
fn server_overrides(_command: &Commands) -> CliOverrides {
    CliOverrides::default()
}
