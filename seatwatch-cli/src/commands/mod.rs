//! CLI command implementations.

pub mod config;
pub mod cookie;
pub mod fetch;

use clap::Args;
use seatwatch_core::PipelineError;
use seatwatch_fetch::PipelineSettings;
use seatwatch_store::{load_dotenv, Config, StoreError};
use tracing::{debug, error};

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Flags shared by commands that drive the pipeline.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Proxy URL, overriding `PROXY_SERVER` and the config file.
    #[arg(long)]
    pub proxy: Option<String>,

    /// Overall deadline in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(proxy) = &self.proxy {
            config.proxy.url = Some(proxy.clone());
        }
        if let Some(secs) = self.timeout {
            config.general.request_timeout_secs = secs;
        }
    }
}

/// Loads `.env`, the config file and the process environment.
pub fn load_config(cli: &Cli) -> Result<Config, StoreError> {
    if let Some(path) = load_dotenv()? {
        debug!(path = %path.display(), "Environment file applied");
    }
    Config::load(cli.config.as_deref())
}

/// Resolves pipeline settings after `overrides` has applied command flags.
///
/// Configuration detail is logged for the operator before it is folded
/// into [`PipelineError::Configuration`].
pub fn resolve_settings<F>(cli: &Cli, run: &RunArgs, overrides: F) -> Result<PipelineSettings, PipelineError>
where
    F: FnOnce(&mut Config),
{
    let settings = load_config(cli).and_then(|mut config| {
        run.apply(&mut config);
        overrides(&mut config);
        config.to_settings()
    });

    settings.map_err(|e| {
        error!(error = %e, "Invalid configuration");
        PipelineError::from(e)
    })
}

/// Renders a pipeline failure and wraps it for the exit code.
///
/// JSON mode writes the error envelope to stdout; text mode writes to stderr.
pub fn report_failure(cli: &Cli, err: PipelineError) -> anyhow::Error {
    match cli.format {
        OutputFormat::Json => match JsonFormatter::new(cli.pretty).format_error(&err) {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = %e, "Failed to serialize error envelope"),
        },
        OutputFormat::Text => {
            if !cli.quiet {
                eprintln!("{}", TextFormatter::new(!cli.no_color).format_error(&err));
            }
        }
    }
    anyhow::Error::new(err)
}
