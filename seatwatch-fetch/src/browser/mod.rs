//! Automated browser abstraction.
//!
//! The pipeline never talks to Chromium directly. It goes through
//! [`BrowserLauncher`] and [`BrowserSession`], and every session it opens
//! lives inside a [`BrowserScope`] that closes it on all exit paths.

mod scope;

pub use scope::BrowserScope;

use async_trait::async_trait;
use seatwatch_core::ProxyConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{BrowserSettings, WaitCondition};
use crate::error::BrowserError;
use crate::host::cookie_store::Cookie;

// ============================================================================
// Launch Options
// ============================================================================

/// Options for one browser launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Run without a visible window.
    pub headless: bool,
    /// Keep the Chromium sandbox enabled.
    pub sandbox: bool,
    /// Viewport size.
    pub viewport: (u32, u32),
    /// Explicit executable.
    pub executable: Option<PathBuf>,
    /// `User-Agent` override.
    pub user_agent: Option<String>,
    /// Proxy applied at launch. Credentials go through a separate step.
    pub proxy: Option<ProxyConfig>,
    /// Per-navigation timeout.
    pub navigation_timeout: Duration,
}

impl LaunchOptions {
    /// Builds launch options from browser settings.
    pub fn from_settings(settings: &BrowserSettings, proxy: Option<&ProxyConfig>) -> Self {
        Self {
            headless: settings.headless,
            sandbox: settings.sandbox,
            viewport: (settings.viewport_width, settings.viewport_height),
            executable: settings.executable.clone(),
            user_agent: None,
            proxy: proxy.cloned(),
            navigation_timeout: settings.navigation_timeout,
        }
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from_settings(&BrowserSettings::default(), None)
    }
}

// ============================================================================
// Navigation Response
// ============================================================================

/// Main-frame response of a navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationResponse {
    /// HTTP status, if the browser reported one.
    pub status: Option<u16>,
    /// Reason phrase.
    pub status_text: String,
}

impl NavigationResponse {
    /// Returns true for a missing status or a 2xx status.
    pub fn is_ok(&self) -> bool {
        self.status.is_none_or(|s| (200..300).contains(&s))
    }
}

// ============================================================================
// Traits
// ============================================================================

/// One running browser with a single page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigates the page and waits for it to settle.
    async fn navigate(
        &self,
        url: &str,
        wait: WaitCondition,
    ) -> Result<NavigationResponse, BrowserError>;

    /// Returns every cookie visible to the page.
    async fn cookies(&self) -> Result<Vec<Cookie>, BrowserError>;

    /// Returns the rendered body text.
    async fn body_text(&self) -> Result<String, BrowserError>;

    /// Terminates the browser. Safe to call more than once.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches an isolated browser.
    ///
    /// Proxy credentials, when present, must be in place before this returns.
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserSession>, BrowserError>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_response_ok() {
        assert!(NavigationResponse::default().is_ok());
        assert!(
            NavigationResponse {
                status: Some(204),
                status_text: String::new()
            }
            .is_ok()
        );
        assert!(
            !NavigationResponse {
                status: Some(403),
                status_text: "Forbidden".into()
            }
            .is_ok()
        );
    }

    #[test]
    fn test_launch_options_from_settings() {
        let proxy = ProxyConfig::resolve("http://u:p@proxy.local:8080").unwrap();
        let options = LaunchOptions::from_settings(&BrowserSettings::default(), Some(&proxy));
        assert_eq!(options.viewport, (1920, 1080));
        assert!(options.sandbox);
        assert_eq!(options.proxy.unwrap().address(), "proxy.local:8080");
    }
}
