//! Cookie command - harvest a session cookie with the automated browser.
//!
//! The cookie goes to stdout so it can be piped into `TM_COOKIE`; progress
//! goes to stderr.

use anyhow::Result;
use clap::Args;
use seatwatch_fetch::AvailabilityPipeline;
use seatwatch_store::Config;

use super::{report_failure, resolve_settings, RunArgs};
use crate::output::{CookieOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the cookie command.
#[derive(Args, Debug, Default)]
pub struct CookieArgs {
    /// Page the browser warms the session on.
    #[arg(long)]
    pub warmup_url: Option<String>,

    /// Show the browser window.
    #[arg(long)]
    pub headful: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

impl CookieArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.warmup_url {
            config.browser.warmup_url.clone_from(url);
        }
        if self.headful {
            config.browser.headless = false;
        }
    }
}

/// Runs the cookie command.
pub async fn run(args: &CookieArgs, cli: &Cli) -> Result<()> {
    let settings = resolve_settings(cli, &args.run, |config| args.apply(config))
        .map_err(|e| report_failure(cli, e))?;
    let pipeline = AvailabilityPipeline::from_settings(settings).map_err(|e| report_failure(cli, e))?;
    let formatter = TextFormatter::new(!cli.no_color);

    if !cli.quiet {
        eprintln!("{}", formatter.progress("Launching browser to collect a session cookie..."));
    }

    let credential = pipeline
        .export_cookie()
        .await
        .map_err(|e| report_failure(cli, e))?;

    match cli.format {
        OutputFormat::Json => {
            let output = CookieOutput::from_credential(&credential);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
        OutputFormat::Text => {
            println!("{}", credential.cookie_header());
            if !cli.quiet {
                eprintln!("{}", formatter.format_cookie_summary(&credential));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_browser() {
        let mut config = Config::default();
        let args = CookieArgs {
            warmup_url: Some("https://vendor.tld/".to_string()),
            headful: true,
            run: RunArgs::default(),
        };
        args.apply(&mut config);

        assert_eq!(config.browser.warmup_url, "https://vendor.tld/");
        assert!(!config.browser.headless);
    }
}
