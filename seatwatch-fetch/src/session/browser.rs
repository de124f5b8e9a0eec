//! Headless browser provider.

use async_trait::async_trait;
use seatwatch_core::{CredentialSource, SessionCredential};
use tracing::{debug, instrument, warn};

use super::{AcquireContext, SessionProvider};
use crate::browser::{BrowserScope, BrowserSession, LaunchOptions};
use crate::context::{PipelineSettings, ProviderKind};
use crate::error::SessionError;
use crate::host::cookie_store::{cookies_to_header, Cookie};

/// Warms up an automated browser on the vendor's site and reads its cookies.
#[derive(Debug, Clone)]
pub struct BrowserProvider {
    scope: BrowserScope,
}

impl BrowserProvider {
    /// Creates a provider launching browsers through `scope`.
    pub fn new(scope: BrowserScope) -> Self {
        Self { scope }
    }

    /// Returns the browser scope.
    pub fn scope(&self) -> &BrowserScope {
        &self.scope
    }
}

/// Launch options used for session acquisition.
pub(crate) fn launch_options(settings: &PipelineSettings) -> LaunchOptions {
    LaunchOptions::from_settings(&settings.browser, settings.proxy.as_ref())
        .with_user_agent(settings.vendor.user_agent.as_str())
}

/// Navigates `session` to `target` and collects the vendor cookies.
///
/// # Errors
///
/// Returns [`SessionError::Browser`] if navigation or the cookie read fails.
#[instrument(skip_all)]
pub async fn collect_session(
    session: &dyn BrowserSession,
    settings: &PipelineSettings,
    target: &str,
) -> Result<SessionCredential, SessionError> {
    let response = session.navigate(target, settings.browser.wait_until).await?;
    if !response.is_ok() {
        // Challenge pages often answer non-2xx yet still set cookies.
        warn!(status = ?response.status, "Warm-up page answered with an error status");
    }

    let domain = settings.vendor.cookie_domain.as_str();
    let cookies: Vec<Cookie> = session
        .cookies()
        .await?
        .into_iter()
        .filter(|c| c.matches_domain(domain) && !c.is_expired())
        .collect();

    debug!(count = cookies.len(), "Collected vendor cookies");
    Ok(SessionCredential::new(
        cookies_to_header(&cookies),
        domain,
        CredentialSource::BrowserAutomation,
    ))
}

#[async_trait]
impl SessionProvider for BrowserProvider {
    fn id(&self) -> &str {
        "session.browser"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Browser
    }

    async fn acquire(&self, ctx: &AcquireContext<'_>) -> Result<SessionCredential, SessionError> {
        let settings = ctx.settings;
        let target = settings
            .browser
            .warmup_url
            .as_deref()
            .unwrap_or(ctx.request.event_url.as_str());

        self.scope
            .run(&launch_options(settings), ctx.deadline, |session| async move {
                collect_session(session.as_ref(), settings, target).await
            })
            .await
    }
}
