//! Config command - manage configuration.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use seatwatch_store::{default_config_dir, save_toml, Config};
use std::path::PathBuf;
use tracing::info;

use super::load_config;
use crate::output::{JsonFormatter, PathsOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration with credentials masked.
    Show,

    /// Show configuration paths.
    Path,

    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_paths(cli),
        ConfigAction::Init { force } => init_config(cli, *force).await,
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let validation = config.to_settings().err();
    let redacted = config.redacted();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_config_header(validation.as_ref()));
            println!();
            print!("{}", toml::to_string_pretty(&redacted)?);
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&redacted)?);
        }
    }

    match validation {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_file = config_path(cli);
    let output = PathsOutput {
        exists: config_file.exists(),
        config_file: config_file.display().to_string(),
        config_dir: default_config_dir().display().to_string(),
    };

    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_paths(&output));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(())
}

async fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = config_path(cli);
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }

    save_toml(&path, &Config::default()).await?;
    info!(path = %path.display(), "Wrote default configuration");

    if !cli.quiet {
        println!("Wrote default configuration to {}", path.display());
    }
    Ok(())
}
