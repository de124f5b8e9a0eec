//! Pipeline Orchestrator.
//!
//! One run moves through
//! `Received → IdExtracted → SessionAcquiring → SessionAcquired → Fetching → Classified → Done`,
//! and may enter `Failed` from any stage. Every browser created on the way
//! is owned by a [`BrowserScope`] and closed before `run` returns.

use seatwatch_core::{
    EventRequest, PipelineError, ResourceId, RetrievalResult, SessionCredential,
    SessionFailureReason,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;
use tracing::{debug, field, info, instrument, warn, Span};

use crate::agent::{AgentTransport, HandlerTable, HttpAgentTransport, LocalAgentTransport};
use crate::browser::{BrowserLauncher, BrowserScope};
use crate::classify::{BlockDetector, SubstringBlockDetector};
use crate::context::{AgentTransportKind, PipelineSettings, ProviderKind, DEFAULT_WARMUP_URL};
use crate::error::{AgentError, BrowserError, FetchError, HttpError, SessionError};
use crate::host::chromium::ChromiumLauncher;
use crate::host::cookie_store::{CookieStore, InstalledBrowser};
use crate::host::http::HttpClient;
use crate::retrieval::{fetch_in_browser, RetrievalExecutor};
use crate::session::{
    collect_session, is_fallback_error, launch_options, AcquireContext, AgentProvider,
    BrowserProvider, CallerProvider, SessionAttempt, SessionChain, SessionProvider,
    StaticProvider,
};

// ============================================================================
// Pipeline Stage
// ============================================================================

/// Stages of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Request accepted.
    Received,
    /// Event id extracted from the URL.
    IdExtracted,
    /// A session provider is running.
    SessionAcquiring,
    /// A plausible credential is available.
    SessionAcquired,
    /// The availability request is in flight.
    Fetching,
    /// The vendor response has been classified.
    Classified,
    /// Success.
    Done,
    /// Terminal failure.
    Failed,
}

impl PipelineStage {
    /// Returns the stage name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::IdExtracted => "id_extracted",
            Self::SessionAcquiring => "session_acquiring",
            Self::SessionAcquired => "session_acquired",
            Self::Fetching => "fetching",
            Self::Classified => "classified",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(stage: PipelineStage) {
    debug!(stage = stage.as_str(), "Pipeline stage");
}

// ============================================================================
// Pipeline Outcome
// ============================================================================

/// The outcome of one run, with the provider attempts that led to it.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// The availability payload, unmodified, or the terminal error.
    pub result: Result<Value, PipelineError>,
    /// Session provider attempts.
    pub attempts: Vec<SessionAttempt>,
    /// Total duration.
    pub duration: Duration,
}

impl PipelineOutcome {
    /// Returns true if the run produced a payload.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the provider whose credential was used, if any.
    pub fn provider(&self) -> Option<ProviderKind> {
        self.attempts.iter().find(|a| a.success).map(|a| a.kind)
    }
}

// ============================================================================
// Availability Pipeline
// ============================================================================

/// Runs event URL to availability payload.
///
/// Built once from immutable settings; runs share nothing but the browser
/// concurrency bound.
#[derive(Clone)]
pub struct AvailabilityPipeline {
    settings: Arc<PipelineSettings>,
    chain: SessionChain,
    retrieval: RetrievalExecutor,
    scope: BrowserScope,
    detector: Arc<dyn BlockDetector>,
}

impl AvailabilityPipeline {
    /// Builds a pipeline that launches Chromium for browser work.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if a client or transport
    /// cannot be built from `settings`.
    pub fn from_settings(settings: PipelineSettings) -> Result<Self, PipelineError> {
        Self::with_launcher(settings, Arc::new(ChromiumLauncher::new()))
    }

    /// Builds a pipeline with an explicit browser launcher.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if a client or transport
    /// cannot be built from `settings`.
    pub fn with_launcher(
        settings: PipelineSettings,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Result<Self, PipelineError> {
        let detector: Arc<dyn BlockDetector> =
            Arc::new(SubstringBlockDetector::from_settings(&settings.vendor));
        let scope = BrowserScope::new(launcher, settings.browser.max_concurrent);

        let providers = settings
            .provider_order()
            .into_iter()
            .map(|kind| build_provider(kind, &settings, &scope))
            .collect::<Result<Vec<_>, _>>()?;
        let chain = SessionChain::new(providers, settings.credential_policy);

        let retrieval = RetrievalExecutor::from_settings(&settings, Arc::clone(&detector))
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        debug!(chain = ?chain, "Pipeline assembled");
        Ok(Self {
            settings: Arc::new(settings),
            chain,
            retrieval,
            scope,
            detector,
        })
    }

    /// Returns the settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Returns the browser scope.
    pub fn scope(&self) -> &BrowserScope {
        &self.scope
    }

    /// Runs the pipeline and returns the payload.
    ///
    /// # Errors
    ///
    /// Returns the [`PipelineError`] the run terminated with.
    pub async fn run(&self, request: &EventRequest) -> Result<Value, PipelineError> {
        self.run_detailed(request).await.result
    }

    /// Runs the pipeline and returns the outcome with provider attempts.
    #[instrument(
        skip_all,
        fields(provider = %self.settings.session.provider, event_id = field::Empty)
    )]
    pub async fn run_detailed(&self, request: &EventRequest) -> PipelineOutcome {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.settings.request_timeout;
        let mut attempts = Vec::new();

        let result = self.execute(request, deadline, &mut attempts).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                enter(PipelineStage::Done);
                info!(elapsed = ?duration, attempts = attempts.len(), "Availability retrieved");
            }
            Err(e) => {
                enter(PipelineStage::Failed);
                warn!(
                    category = e.category(),
                    error = %e,
                    elapsed = ?duration,
                    attempts = attempts.len(),
                    "Pipeline failed"
                );
            }
        }

        PipelineOutcome {
            result,
            attempts,
            duration,
        }
    }

    /// Acquires a browser session against the warm-up page and returns it.
    ///
    /// # Errors
    ///
    /// Returns the mapped [`PipelineError`] if the browser fails or the
    /// credential is rejected by the policy.
    #[instrument(skip_all)]
    pub async fn export_cookie(&self) -> Result<SessionCredential, PipelineError> {
        let target = self
            .settings
            .browser
            .warmup_url
            .clone()
            .unwrap_or_else(|| DEFAULT_WARMUP_URL.to_string());
        let request = EventRequest::new(target);
        let ctx = AcquireContext {
            request: &request,
            settings: &self.settings,
            deadline: tokio::time::Instant::now() + self.settings.request_timeout,
        };

        let chain = SessionChain::new(
            vec![Arc::new(BrowserProvider::new(self.scope.clone()))],
            self.settings.credential_policy,
        );
        chain
            .acquire(&ctx)
            .await
            .result
            .map_err(|e| self.failure(e))
    }

    async fn execute(
        &self,
        request: &EventRequest,
        deadline: tokio::time::Instant,
        attempts: &mut Vec<SessionAttempt>,
    ) -> Result<Value, PipelineError> {
        enter(PipelineStage::Received);
        let id = ResourceId::extract(&request.event_url)?;
        Span::current().record("event_id", id.as_str());
        enter(PipelineStage::IdExtracted);

        let ctx = AcquireContext {
            request,
            settings: &self.settings,
            deadline,
        };

        enter(PipelineStage::SessionAcquiring);
        let result = if self.reuses_browser() {
            let started = Instant::now();
            match self.browser_round_trip(&id, &ctx).await {
                Ok(result) => {
                    attempts.push(SessionAttempt::success(
                        "session.browser",
                        ProviderKind::Browser,
                        started.elapsed(),
                    ));
                    result
                }
                Err(error) => {
                    attempts.push(SessionAttempt::failure(
                        "session.browser",
                        ProviderKind::Browser,
                        &error,
                        started.elapsed(),
                    ));
                    let fallbacks = self.chain.fallbacks();
                    if fallbacks.is_empty() || !is_fallback_error(&error) {
                        return Err(self.failure(error));
                    }
                    debug!(error = %error, "Browser round trip failed, using fallback provider");
                    self.acquire_and_fetch(&fallbacks, &id, &ctx, attempts).await?
                }
            }
        } else {
            self.acquire_and_fetch(&self.chain, &id, &ctx, attempts).await?
        };

        enter(PipelineStage::Classified);
        debug!(result = result.label(), "Vendor response classified");
        into_payload(result)
    }

    fn reuses_browser(&self) -> bool {
        self.settings.browser.reuse_for_retrieval && self.chain.primary() == Some(ProviderKind::Browser)
    }

    async fn acquire_and_fetch(
        &self,
        chain: &SessionChain,
        id: &ResourceId,
        ctx: &AcquireContext<'_>,
        attempts: &mut Vec<SessionAttempt>,
    ) -> Result<RetrievalResult, PipelineError> {
        let outcome = chain.acquire(ctx).await;
        attempts.extend(outcome.attempts);
        let credential = outcome.result.map_err(|e| self.failure(e))?;
        enter(PipelineStage::SessionAcquired);

        enter(PipelineStage::Fetching);
        let fetch = self
            .retrieval
            .fetch_availability(id, &credential, &ctx.request.event_url);
        match timeout_at(ctx.deadline, fetch).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(self.failure(e)),
            Err(_) => Err(PipelineError::Timeout(self.settings.request_timeout)),
        }
    }

    /// Warm-up, cookie read and endpoint navigation inside one browser.
    async fn browser_round_trip(
        &self,
        id: &ResourceId,
        ctx: &AcquireContext<'_>,
    ) -> Result<RetrievalResult, SessionError> {
        let settings = ctx.settings;
        let target = settings
            .browser
            .warmup_url
            .as_deref()
            .unwrap_or(ctx.request.event_url.as_str());
        let url = self.retrieval.endpoint().url_for(id);
        let policy = settings.credential_policy;
        let detector = self.detector.as_ref();

        self.scope
            .run(&launch_options(settings), ctx.deadline, |session| async move {
                let credential = collect_session(session.as_ref(), settings, target).await?;
                policy
                    .check_credential(&credential)
                    .map_err(SessionError::IncompleteCredential)?;
                enter(PipelineStage::SessionAcquired);

                enter(PipelineStage::Fetching);
                let result =
                    fetch_in_browser(session.as_ref(), &url, settings.browser.wait_until, detector)
                        .await?;
                Ok(result)
            })
            .await
    }

    /// Maps a lower-layer error onto the caller-facing taxonomy.
    fn failure(&self, error: impl Into<FetchError>) -> PipelineError {
        match error.into() {
            FetchError::Session(e) => self.session_failure(e),
            FetchError::Browser(e) => self.session_failure(SessionError::Browser(e)),
            FetchError::Http(e) => self.http_failure(e),
        }
    }

    fn session_failure(&self, error: SessionError) -> PipelineError {
        let reason = match &error {
            SessionError::NotSupplied => return PipelineError::MissingField("cookie"),
            SessionError::Configuration(msg) => return PipelineError::Configuration(msg.clone()),
            SessionError::NoProviders => return PipelineError::Configuration(error.to_string()),
            SessionError::DeadlineElapsed | SessionError::Browser(BrowserError::DeadlineElapsed) => {
                return PipelineError::Timeout(self.settings.request_timeout);
            }
            SessionError::IncompleteCredential(_) => SessionFailureReason::IncompleteCredential,
            SessionError::Agent(AgentError::Unavailable(_)) => SessionFailureReason::AgentUnavailable,
            SessionError::Agent(_) => SessionFailureReason::AgentRejected,
            SessionError::Browser(BrowserError::ProxyAuthentication(_)) => {
                SessionFailureReason::ProxyAuthentication
            }
            SessionError::Browser(_) => SessionFailureReason::BrowserFailure,
        };

        PipelineError::SessionAcquisition {
            reason,
            message: error.to_string(),
        }
    }

    fn http_failure(&self, error: HttpError) -> PipelineError {
        match error {
            HttpError::Timeout => PipelineError::Timeout(self.settings.request_timeout),
            // Only the cookie can carry caller-controlled bytes into a header.
            HttpError::InvalidHeader(name) => PipelineError::SessionAcquisition {
                reason: SessionFailureReason::IncompleteCredential,
                message: format!("credential cannot be sent as a {name} header"),
            },
            other => PipelineError::Upstream {
                status_code: None,
                status_text: other.to_string(),
            },
        }
    }
}

impl fmt::Debug for AvailabilityPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvailabilityPipeline")
            .field("chain", &self.chain)
            .field("retrieval", &self.retrieval)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

fn into_payload(result: RetrievalResult) -> Result<Value, PipelineError> {
    match result {
        RetrievalResult::Success { payload } => Ok(payload),
        RetrievalResult::Blocked { raw_body } => Err(PipelineError::Blocked { raw_body }),
        RetrievalResult::UpstreamError {
            status_code,
            status_text,
        } => Err(PipelineError::Upstream {
            status_code: Some(status_code),
            status_text,
        }),
        RetrievalResult::MalformedPayload { raw_body } => {
            Err(PipelineError::MalformedPayload { raw_body })
        }
    }
}

// ============================================================================
// Provider Construction
// ============================================================================

fn build_provider(
    kind: ProviderKind,
    settings: &PipelineSettings,
    scope: &BrowserScope,
) -> Result<Arc<dyn SessionProvider>, PipelineError> {
    let provider: Arc<dyn SessionProvider> = match kind {
        ProviderKind::Browser => Arc::new(BrowserProvider::new(scope.clone())),
        ProviderKind::Agent => Arc::new(AgentProvider::new(agent_transport(settings)?)),
        ProviderKind::Static => Arc::new(StaticProvider::new(settings.session.static_cookie.clone())),
        ProviderKind::Caller => Arc::new(CallerProvider::new()),
    };
    Ok(provider)
}

fn agent_transport(settings: &PipelineSettings) -> Result<Arc<dyn AgentTransport>, PipelineError> {
    match settings.agent.transport {
        AgentTransportKind::Http => {
            // The agent runs on this host; it is never reached through the proxy.
            let client = HttpClient::builder()
                .timeout(settings.agent.timeout)
                .build()
                .map_err(|e| PipelineError::Configuration(e.to_string()))?;
            Ok(Arc::new(HttpAgentTransport::new(client, settings.agent.url.as_str())))
        }
        AgentTransportKind::Local => {
            let browsers = settings
                .agent
                .browsers
                .iter()
                .map(|name| name.parse::<InstalledBrowser>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(PipelineError::Configuration)?;
            let table = HandlerTable::cookie_agent(CookieStore::with_browsers(browsers));
            Ok(Arc::new(LocalAgentTransport::new(table)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BrowserSettings;
    use crate::testing::{long_value, BrowserEvent, FakeLauncher};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reuse_settings() -> BrowserSettings {
        BrowserSettings {
            reuse_for_retrieval: true,
            ..BrowserSettings::default()
        }
    }

    #[tokio::test]
    async fn test_reuse_shape_fetches_inside_browser() {
        let launcher = FakeLauncher::new()
            .with_cookie("reese84", &long_value(300), ".ticketmaster.nl")
            .with_page(
                "https://api.vendor.test/api/v2/TM_NL/availability/9999",
                200,
                r#"{"groups":[],"offers":[]}"#,
            );
        let state = launcher.state();
        let settings = PipelineSettings::builder()
            .api_base("https://api.vendor.test")
            .browser(reuse_settings())
            .build();
        let pipeline = AvailabilityPipeline::with_launcher(settings, Arc::new(launcher)).unwrap();

        let outcome = pipeline
            .run_detailed(&EventRequest::new("https://www.ticketmaster.nl/event/example-9999"))
            .await;
        assert_eq!(outcome.provider(), Some(ProviderKind::Browser));
        assert_eq!(outcome.result.unwrap(), json!({"groups": [], "offers": []}));

        let navigations = state.navigations();
        assert_eq!(navigations.len(), 2);
        assert!(navigations[1].ends_with("/availability/9999?subChannelId=1"));
        assert_eq!(
            state.events().iter().filter(|e| **e == BrowserEvent::Launched).count(),
            1
        );
        assert_eq!(state.events().last(), Some(&BrowserEvent::Closed));
    }

    #[tokio::test]
    async fn test_reuse_shape_falls_back_after_incomplete_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/TM_NL/availability/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"groups": [], "offers": []})))
            .expect(1)
            .mount(&server)
            .await;

        let launcher = FakeLauncher::new();
        let state = launcher.state();
        let settings = PipelineSettings::builder()
            .api_base(server.uri())
            .browser(reuse_settings())
            .provider(ProviderKind::Browser)
            .fallback(ProviderKind::Static)
            .static_cookie(format!("session={}", long_value(300)))
            .build();
        let pipeline = AvailabilityPipeline::with_launcher(settings, Arc::new(launcher)).unwrap();

        let outcome = pipeline
            .run_detailed(&EventRequest::new("https://www.ticketmaster.nl/event/x-42"))
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].success);
        assert_eq!(outcome.provider(), Some(ProviderKind::Static));
        assert_eq!(state.active(), 0);
    }

    #[tokio::test]
    async fn test_browser_timeout_tears_down_before_error() {
        let launcher = FakeLauncher::new().with_navigation_delay(Duration::from_secs(30));
        let state = launcher.state();
        let settings = PipelineSettings::builder()
            .request_timeout(Duration::from_millis(100))
            .build();
        let pipeline = AvailabilityPipeline::with_launcher(settings, Arc::new(launcher)).unwrap();

        let err = pipeline
            .run(&EventRequest::new("https://www.ticketmaster.nl/event/x-42"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout(t) if t == Duration::from_millis(100)));
        assert_eq!(err.status_code(), 504);
        assert_eq!(state.events().last(), Some(&BrowserEvent::Closed));
        assert_eq!(pipeline.scope().available_permits(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_run_still_closes_browser() {
        let launcher = FakeLauncher::new().with_navigation_delay(Duration::from_secs(30));
        let state = launcher.state();
        let pipeline =
            AvailabilityPipeline::with_launcher(PipelineSettings::builder().build(), Arc::new(launcher))
                .unwrap();

        let request = EventRequest::new("https://www.ticketmaster.nl/event/x-42");
        assert!(
            tokio::time::timeout(Duration::from_millis(100), pipeline.run(&request))
                .await
                .is_err()
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.events().last(), Some(&BrowserEvent::Closed));
        assert_eq!(state.active(), 0);
        assert_eq!(pipeline.scope().available_permits(), 2);
        assert!(format!("{pipeline:?}").starts_with("AvailabilityPipeline"));
    }

    #[test]
    fn test_acquisition_deadline_is_timeout() {
        let settings = PipelineSettings::builder()
            .request_timeout(Duration::from_secs(3))
            .build();
        let pipeline =
            AvailabilityPipeline::with_launcher(settings, Arc::new(FakeLauncher::new())).unwrap();

        let err = pipeline.session_failure(SessionError::DeadlineElapsed);
        assert!(matches!(err, PipelineError::Timeout(t) if t == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_acquisition() {
        let launcher = FakeLauncher::new();
        let state = launcher.state();
        let pipeline =
            AvailabilityPipeline::with_launcher(PipelineSettings::builder().build(), Arc::new(launcher))
                .unwrap();

        let err = pipeline
            .run(&EventRequest::new("https://www.ticketmaster.nl/event/no-id"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidUrl(_)));
        assert!(state.events().is_empty());
    }

    #[tokio::test]
    async fn test_launch_failure_is_browser_failure() {
        let settings = PipelineSettings::builder().build();
        let pipeline =
            AvailabilityPipeline::with_launcher(settings, Arc::new(FakeLauncher::new().failing_launch()))
                .unwrap();

        let err = pipeline
            .run(&EventRequest::new("https://www.ticketmaster.nl/event/x-42"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SessionAcquisition {
                reason: SessionFailureReason::BrowserFailure,
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_export_cookie_uses_warmup_page() {
        let launcher = FakeLauncher::new().with_cookie("reese84", &long_value(300), "ticketmaster.nl");
        let state = launcher.state();
        let settings = PipelineSettings::builder().provider(ProviderKind::Caller).build();
        let pipeline = AvailabilityPipeline::with_launcher(settings, Arc::new(launcher)).unwrap();

        let credential = pipeline.export_cookie().await.unwrap();
        assert!(credential.cookie_header().starts_with("reese84="));
        assert_eq!(state.navigations(), vec![DEFAULT_WARMUP_URL.to_string()]);
        assert_eq!(state.active(), 0);
    }

    #[tokio::test]
    async fn test_unknown_local_agent_browser_is_configuration_error() {
        let mut settings = PipelineSettings::builder().provider(ProviderKind::Agent).build();
        settings.agent.transport = AgentTransportKind::Local;
        settings.agent.browsers = vec!["netscape".to_string()];

        let err = AvailabilityPipeline::with_launcher(settings, Arc::new(FakeLauncher::new())).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
