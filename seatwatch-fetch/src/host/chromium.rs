//! Chromium automation via the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::auth::Credentials;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::Cookie as CdpCookie;
use chromiumoxide::cdp::browser_protocol::page::EventLifecycleEvent;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn};

use crate::browser::{BrowserLauncher, BrowserSession, LaunchOptions, NavigationResponse};
use crate::context::WaitCondition;
use crate::error::BrowserError;
use crate::host::cookie_store::Cookie;

/// Lifecycle event Chromium emits once the page has had no network
/// activity for 500ms.
const NETWORK_IDLE_EVENT: &str = "networkIdle";

/// Latest cookie expiry accepted, in seconds since the epoch (year 9999).
const MAX_COOKIE_EXPIRY_SECS: f64 = 253_402_300_799.0;

/// Script returning the rendered body text.
const BODY_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

// ============================================================================
// Launcher
// ============================================================================

/// Launches local Chromium instances, each with a throwaway profile.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    /// Creates a launcher.
    pub fn new() -> Self {
        Self
    }

    fn config(options: &LaunchOptions, profile: &tempfile::TempDir) -> Result<BrowserConfig, BrowserError> {
        let (width, height) = options.viewport;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            })
            .request_timeout(options.navigation_timeout);

        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.arg(format!("--user-agent={user_agent}"));
        }
        // Address only; credentials are answered through the auth challenge.
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy.endpoint()));
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    #[instrument(skip_all, fields(headless = options.headless, proxied = options.proxy.is_some()))]
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let profile = tempfile::Builder::new().prefix("seatwatch-profile-").tempdir()?;
        let config = Self::config(options, &profile)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        // From here on the session owns the process and must be closed on failure.
        let session = ChromiumSession {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            page: Mutex::new(None),
            navigation_timeout: options.navigation_timeout,
            _profile: profile,
        };

        match session.open_page(options).await {
            Ok(()) => {
                debug!("Chromium session ready");
                Ok(Arc::new(session))
            }
            Err(e) => {
                let _ = session.close().await;
                Err(e)
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A running Chromium with one page.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    page: Mutex<Option<Page>>,
    navigation_timeout: Duration,
    _profile: tempfile::TempDir,
}

impl ChromiumSession {
    async fn open_page(&self, options: &LaunchOptions) -> Result<(), BrowserError> {
        let page = {
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| BrowserError::Launch("browser already closed".to_string()))?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?
        };

        // Must be in place before the first proxied navigation.
        if let Some(proxy) = options.proxy.as_ref().filter(|p| p.has_credentials()) {
            page.authenticate(Credentials {
                username: proxy.username.clone().unwrap_or_default(),
                password: proxy.password.clone().unwrap_or_default(),
            })
            .await
            .map_err(|e| BrowserError::ProxyAuthentication(e.to_string()))?;
            debug!("Proxy authentication configured");
        }

        *self.page.lock().await = Some(page);
        Ok(())
    }

    async fn page(&self) -> Result<Page, BrowserError> {
        self.page
            .lock()
            .await
            .clone()
            .ok_or_else(|| BrowserError::Read("page is not open".to_string()))
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.get_mut().take() {
            handler.abort();
        }
        let Some(mut browser) = self.browser.get_mut().take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Chromium session dropped while open; killing the process");
                runtime.spawn(async move {
                    let _ = browser.kill().await;
                });
            }
            Err(_) => warn!("Chromium session dropped outside a runtime"),
        }
    }
}

/// Converts a CDP expiry (fractional seconds, `-1` for session cookies).
#[allow(clippy::cast_possible_truncation)]
fn cookie_expiry(expires: f64) -> Option<DateTime<Utc>> {
    let secs = expires.trunc();
    if !secs.is_finite() || secs <= 0.0 || secs > MAX_COOKIE_EXPIRY_SECS {
        return None;
    }
    Utc.timestamp_opt(secs as i64, 0).single()
}

fn from_cdp_cookie(cookie: CdpCookie) -> Cookie {
    let expires = cookie_expiry(cookie.expires);

    Cookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires,
        secure: cookie.secure,
        http_only: cookie.http_only,
    }
}

fn redacted(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    #[instrument(skip(self, url), fields(url = %redacted(url)))]
    async fn navigate(
        &self,
        url: &str,
        wait: WaitCondition,
    ) -> Result<NavigationResponse, BrowserError> {
        let page = self.page().await?;
        let navigation_error = |e: chromiumoxide::error::CdpError| BrowserError::Navigation {
            url: redacted(url),
            reason: e.to_string(),
        };

        let navigation = async {
            // Subscribed before navigating so the idle event cannot be missed.
            let mut lifecycle = match wait {
                WaitCondition::NetworkIdle => Some(
                    page.event_listener::<EventLifecycleEvent>()
                        .await
                        .map_err(navigation_error)?,
                ),
                WaitCondition::DomContentLoaded => None,
            };
            page.goto(url).await.map_err(navigation_error)?;
            if let Some(events) = lifecycle.as_mut() {
                while let Some(event) = events.next().await {
                    if event.name == NETWORK_IDLE_EVENT {
                        trace!("Network idle");
                        break;
                    }
                }
            }
            page.wait_for_navigation_response()
                .await
                .map_err(navigation_error)
        };

        let request = tokio::time::timeout(self.navigation_timeout, navigation)
            .await
            .map_err(|_| BrowserError::NavigationTimeout(self.navigation_timeout))??;

        let response = request
            .and_then(|r| r.response.clone())
            .map(|r| NavigationResponse {
                status: u16::try_from(r.status).ok(),
                status_text: r.status_text,
            })
            .unwrap_or_default();

        trace!(status = ?response.status, "Navigation settled");
        Ok(response)
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError> {
        let page = self.page().await?;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| BrowserError::Read(e.to_string()))?;
        Ok(cookies.into_iter().map(from_cdp_cookie).collect())
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        let page = self.page().await?;
        page.evaluate(BODY_TEXT_SCRIPT)
            .await
            .map_err(|e| BrowserError::Read(e.to_string()))?
            .into_value::<String>()
            .map_err(|e| BrowserError::Read(e.to_string()))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.lock().await.take();

        let result = match self.browser.lock().await.take() {
            Some(mut browser) => match browser.close().await {
                Ok(_) => {
                    let _ = browser.wait().await;
                    Ok(())
                }
                Err(e) => {
                    let _ = browser.kill().await;
                    Err(BrowserError::Close(e.to_string()))
                }
            },
            None => Ok(()),
        };

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
