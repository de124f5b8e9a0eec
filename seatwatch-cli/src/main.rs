// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Seatwatch CLI - ticket availability through a vendor session.
//!
//! # Examples
//!
//! ```bash
//! # Availability for an event, session from the configured provider
//! seatwatch fetch https://www.ticketmaster.nl/event/example-9999
//!
//! # Supply the cookie yourself
//! seatwatch fetch <url> --provider caller --cookie "$COOKIE"
//!
//! # Raw vendor payload
//! seatwatch fetch <url> --format json --pretty
//!
//! # Harvest a cookie for TM_COOKIE
//! seatwatch cookie > cookie.txt
//!
//! # Effective configuration, credentials masked
//! seatwatch config show
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use seatwatch_core::PipelineError;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{config, cookie, fetch};

// ============================================================================
// CLI Definition
// ============================================================================

/// Seatwatch CLI - ticket availability retrieval.
#[derive(Parser)]
#[command(name = "seatwatch")]
#[command(about = "Ticket availability through a browser-derived vendor session")]
#[command(long_about = r#"
Seatwatch obtains a session cookie for the ticket vendor and uses it to
fetch seat availability for an event.

Session providers:
  • browser - automated Chromium visit (default)
  • agent   - cookies from an installed agent
  • static  - TM_COOKIE from the environment
  • caller  - cookie passed with --cookie

Examples:
  seatwatch fetch <event-url>                     # Summary
  seatwatch fetch <event-url> --format json       # Raw payload
  seatwatch fetch <event-url> --provider static   # Use TM_COOKIE
  seatwatch cookie                                # Print a fresh cookie
"#)]
#[command(version)]
#[command(author = "Seatwatch Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the platform config directory).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (result only).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch seat availability for an event.
    #[command(visible_alias = "f")]
    Fetch(fetch::FetchArgs),

    /// Collect a session cookie with the automated browser.
    Cookie(cookie::CookieArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Bad event URL or missing cookie.
    InvalidInput = 2,
    /// Invalid configuration.
    Configuration = 3,
    /// Timeout.
    Timeout = 4,
    /// No usable session credential.
    Session = 5,
    /// The vendor failed, blocked, or answered with garbage.
    Upstream = 6,
}

impl ExitCode {
    /// Maps a pipeline failure onto an exit code.
    pub fn for_pipeline(err: &PipelineError) -> Self {
        match err {
            PipelineError::InvalidUrl(_) | PipelineError::MissingField(_) => Self::InvalidInput,
            PipelineError::Configuration(_) => Self::Configuration,
            PipelineError::Timeout(_) => Self::Timeout,
            PipelineError::SessionAcquisition { .. } => Self::Session,
            PipelineError::Upstream { .. }
            | PipelineError::Blocked { .. }
            | PipelineError::MalformedPayload { .. } => Self::Upstream,
        }
    }

    /// Maps any command error onto an exit code.
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(pipeline) = err.downcast_ref::<PipelineError>() {
            return Self::for_pipeline(pipeline);
        }
        if err.downcast_ref::<seatwatch_store::StoreError>().is_some() {
            return Self::Configuration;
        }
        Self::Error
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("seatwatch=debug,info")
    } else {
        EnvFilter::new("seatwatch=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Fetch(args) => fetch::run(args, &cli).await,
        Commands::Cookie(args) => cookie::run(args, &cli).await,
        Commands::Config(args) => config::run(args, &cli).await,
    };

    if let Err(e) = result {
        // Pipeline failures were already rendered by the command.
        if !cli.quiet && e.downcast_ref::<PipelineError>().is_none() {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
