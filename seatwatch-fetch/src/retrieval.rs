//! Retrieval Executor.
//!
//! Issues the authenticated availability request and classifies the
//! response. Two shapes exist: a plain HTTP GET carrying the session
//! cookie, and a navigation inside the browser that produced the session.

use seatwatch_core::{ResourceId, RetrievalResult, SessionCredential};
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

use crate::browser::BrowserSession;
use crate::classify::{classify, BlockDetector};
use crate::context::{PipelineSettings, VendorSettings, WaitCondition};
use crate::error::{BrowserError, HttpError};
use crate::host::http::{vendor_headers, HttpClient};

// ============================================================================
// Vendor Endpoint
// ============================================================================

/// Availability endpoint template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorEndpoint {
    api_base: String,
    region: String,
    sub_channel_id: u32,
}

impl VendorEndpoint {
    /// Creates an endpoint template.
    pub fn new(api_base: impl Into<String>, region: impl Into<String>, sub_channel_id: u32) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            region: region.into(),
            sub_channel_id,
        }
    }

    /// Creates the template from vendor settings.
    pub fn from_settings(vendor: &VendorSettings) -> Self {
        Self::new(vendor.api_base.as_str(), vendor.region.as_str(), vendor.sub_channel_id)
    }

    /// Returns the API host, the only host the session cookie is sent to.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidUrl`] if the base is not an absolute URL.
    pub fn host(&self) -> Result<String, HttpError> {
        Url::parse(&self.api_base)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| HttpError::InvalidUrl(format!("vendor API base: {}", self.api_base)))
    }

    /// Returns the URL for `id`.
    pub fn url_for(&self, id: &ResourceId) -> String {
        format!(
            "{}/api/v2/{}/availability/{}?subChannelId={}",
            self.api_base,
            self.region,
            id.as_str(),
            self.sub_channel_id
        )
    }
}

// ============================================================================
// Retrieval Executor
// ============================================================================

/// Authenticated availability request over HTTP.
#[derive(Clone)]
pub struct RetrievalExecutor {
    client: HttpClient,
    endpoint: VendorEndpoint,
    user_agent: String,
    detector: Arc<dyn BlockDetector>,
}

impl RetrievalExecutor {
    /// Creates an executor from settings, routing through the configured proxy.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidUrl`] for an unusable API base and
    /// [`HttpError::Setup`] if the client cannot be built.
    pub fn from_settings(
        settings: &PipelineSettings,
        detector: Arc<dyn BlockDetector>,
    ) -> Result<Self, HttpError> {
        let endpoint = VendorEndpoint::from_settings(&settings.vendor);
        let client = HttpClient::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.vendor.user_agent.as_str())
            .proxy(settings.proxy.clone())
            .allowed_domains(vec![endpoint.host()?])
            .build()?;

        Ok(Self::new(
            client,
            endpoint,
            settings.vendor.user_agent.as_str(),
            detector,
        ))
    }

    /// Creates an executor with an explicit client.
    pub fn new(
        client: HttpClient,
        endpoint: VendorEndpoint,
        user_agent: impl Into<String>,
        detector: Arc<dyn BlockDetector>,
    ) -> Self {
        Self {
            client,
            endpoint,
            user_agent: user_agent.into(),
            detector,
        }
    }

    /// Returns the endpoint template.
    pub fn endpoint(&self) -> &VendorEndpoint {
        &self.endpoint
    }

    /// Fetches availability for `id` using `credential`.
    ///
    /// `referer` is the caller's event page URL.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] only for transport failures; every HTTP
    /// response is classified into a [`RetrievalResult`].
    #[instrument(skip(self, credential, referer), fields(id = %id))]
    pub async fn fetch_availability(
        &self,
        id: &ResourceId,
        credential: &SessionCredential,
        referer: &str,
    ) -> Result<RetrievalResult, HttpError> {
        let url = self.endpoint.url_for(id);
        let headers = vendor_headers(&self.user_agent, referer, credential.cookie_header())?;

        let response = self.client.get_with_headers(&url, headers).await?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else {
                HttpError::Request(e)
            }
        })?;

        debug!(status = status.as_u16(), bytes = body.len(), "Vendor response received");
        Ok(classify(status.as_u16(), &status_text, body, self.detector.as_ref()))
    }
}

impl std::fmt::Debug for RetrievalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalExecutor")
            .field("endpoint", &self.endpoint)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// Navigates an existing browser session to `url` and classifies the page.
///
/// # Errors
///
/// Returns [`BrowserError`] if navigation or the body read fails.
#[instrument(skip(session, detector))]
pub async fn fetch_in_browser(
    session: &dyn BrowserSession,
    url: &str,
    wait: WaitCondition,
    detector: &dyn BlockDetector,
) -> Result<RetrievalResult, BrowserError> {
    let response = session.navigate(url, wait).await?;
    if !response.is_ok() {
        return Ok(RetrievalResult::UpstreamError {
            status_code: response.status.unwrap_or_default(),
            status_text: response.status_text,
        });
    }

    let body = session.body_text().await?;
    // The page reported no status; classify the body as if it were a 200.
    Ok(classify(
        response.status.unwrap_or(200),
        &response.status_text,
        body,
        detector,
    ))
}

// ============================================================================
// Tests
// ============================================================================
