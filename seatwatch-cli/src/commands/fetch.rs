//! Fetch command - availability for one event.

use anyhow::Result;
use clap::Args;
use seatwatch_core::{extract_id, AvailabilityPayload, EventRequest};
use seatwatch_fetch::{AvailabilityPipeline, PipelineOutcome, ProviderKind};
use seatwatch_store::Config;
use tracing::{debug, warn};

use super::{report_failure, resolve_settings, RunArgs};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the fetch command.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Event page URL, e.g. `https://www.ticketmaster.nl/event/example-9999`.
    pub event_url: String,

    /// Session cookie. Implies `--provider caller` unless a provider is given.
    #[arg(long)]
    pub cookie: Option<String>,

    /// Session provider: browser, agent, static or caller.
    #[arg(long, short = 'p')]
    pub provider: Option<String>,

    /// Provider tried when the primary cannot supply a credential.
    #[arg(long)]
    pub fallback: Option<String>,

    /// Fetch the payload from inside the browser session.
    #[arg(long)]
    pub reuse_browser: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

impl FetchArgs {
    fn apply(&self, config: &mut Config) {
        match (&self.provider, &self.cookie) {
            (Some(provider), _) => config.session.provider.clone_from(provider),
            (None, Some(_)) => {
                debug!("Cookie supplied, using caller provider");
                config.session.provider = ProviderKind::Caller.as_str().to_string();
            }
            (None, None) => {}
        }
        if let Some(fallback) = &self.fallback {
            config.session.fallback = Some(fallback.clone());
        }
        if self.reuse_browser {
            config.browser.reuse_for_retrieval = true;
        }
    }

    fn request(&self) -> EventRequest {
        let request = EventRequest::new(self.event_url.as_str());
        match &self.cookie {
            Some(cookie) => request.with_cookie(cookie.as_str()),
            None => request,
        }
    }
}

/// Runs the fetch command.
pub async fn run(args: &FetchArgs, cli: &Cli) -> Result<()> {
    let settings = resolve_settings(cli, &args.run, |config| args.apply(config))
        .map_err(|e| report_failure(cli, e))?;
    let pipeline = AvailabilityPipeline::from_settings(settings).map_err(|e| report_failure(cli, e))?;

    let outcome = pipeline.run_detailed(&args.request()).await;
    let PipelineOutcome {
        result,
        attempts,
        duration,
    } = outcome;
    let payload = result.map_err(|e| report_failure(cli, e))?;

    match cli.format {
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&payload)?);
        }
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let event_id = extract_id(&args.event_url).ok();

            match AvailabilityPayload::from_value(&payload) {
                Ok(view) => {
                    println!("{}", formatter.format_availability(event_id.as_ref(), &view));
                }
                Err(e) => {
                    warn!(error = %e, "Payload has an unexpected shape, printing it raw");
                    println!("{}", JsonFormatter::new(true).format(&payload)?);
                }
            }

            if !cli.quiet {
                println!();
                println!("{}", formatter.format_session(&attempts, duration, cli.verbose));
            }
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
