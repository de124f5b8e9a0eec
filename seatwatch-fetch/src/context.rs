//! Pipeline settings and the builder used to assemble them.
//!
//! Settings are built once at startup and shared read-only by every
//! pipeline run. Provider selection lives here, not in process globals.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use seatwatch_core::{CredentialPolicy, ProxyConfig};
use serde::{Deserialize, Serialize};

/// Default overall request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Default browser navigation timeout.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Desktop Chrome user agent sent with every vendor request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Event page visited to collect session cookies.
pub const DEFAULT_WARMUP_URL: &str =
    "https://www.ticketmaster.nl/event/avond-van-de-filmmuziek-tickets/3001";

// ============================================================================
// Provider Kind
// ============================================================================

/// Which session provider a deployment activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Headless browser warm-up navigation.
    Browser,
    /// Installed agent with access to a real browser profile.
    Agent,
    /// Pre-provisioned credential from configuration.
    Static,
    /// Credential passed in with the request.
    Caller,
}

impl ProviderKind {
    /// Returns the configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Agent => "agent",
            Self::Static => "static",
            Self::Caller => "caller",
        }
    }

    /// Returns all provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[Self::Browser, Self::Agent, Self::Static, Self::Caller]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" | "browser_automation" | "puppeteer" => Ok(Self::Browser),
            "agent" | "installed_agent" | "extension" => Ok(Self::Agent),
            "static" => Ok(Self::Static),
            "caller" | "caller_supplied" | "request" => Ok(Self::Caller),
            other => {
                let known: Vec<_> = Self::all().iter().map(Self::as_str).collect();
                Err(format!(
                    "unknown session provider: {other} (expected one of {})",
                    known.join(", ")
                ))
            }
        }
    }
}

// ============================================================================
// Wait Condition
// ============================================================================

/// When a browser navigation counts as settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    /// The network has gone quiet after load.
    #[default]
    NetworkIdle,
    /// The DOM finished parsing.
    DomContentLoaded,
}

impl FromStr for WaitCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network_idle" | "networkidle" | "networkidle2" => Ok(Self::NetworkIdle),
            "dom_content_loaded" | "domcontentloaded" => Ok(Self::DomContentLoaded),
            other => Err(format!("unknown wait condition: {other}")),
        }
    }
}

// ============================================================================
// Browser Settings
// ============================================================================

/// Settings for automated browser instances.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Warm-up page. `None` means navigate to the caller's event URL.
    pub warmup_url: Option<String>,
    /// Navigation wait condition.
    pub wait_until: WaitCondition,
    /// Per-navigation timeout.
    pub navigation_timeout: Duration,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
    /// Run without a visible window.
    pub headless: bool,
    /// Keep the Chromium sandbox enabled.
    pub sandbox: bool,
    /// Explicit Chromium executable.
    pub executable: Option<PathBuf>,
    /// Maximum concurrent browser instances.
    pub max_concurrent: usize,
    /// Issue the vendor request from the same browser that acquired the session.
    pub reuse_for_retrieval: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            warmup_url: Some(DEFAULT_WARMUP_URL.to_string()),
            wait_until: WaitCondition::NetworkIdle,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            viewport_width: 1920,
            viewport_height: 1080,
            headless: true,
            sandbox: true,
            executable: None,
            max_concurrent: 2,
            reuse_for_retrieval: false,
        }
    }
}

// ============================================================================
// Vendor Settings
// ============================================================================

/// The vendor API surface.
#[derive(Debug, Clone)]
pub struct VendorSettings {
    /// API origin, e.g. `https://availability.ticketmaster.nl`.
    pub api_base: String,
    /// Region path segment.
    pub region: String,
    /// `subChannelId` query value.
    pub sub_channel_id: u32,
    /// Domain whose cookies form the session.
    pub cookie_domain: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Case-sensitive substrings that mark a soft block.
    pub block_markers: Vec<String>,
}

impl Default for VendorSettings {
    fn default() -> Self {
        Self {
            api_base: "https://availability.ticketmaster.nl".to_string(),
            region: "TM_NL".to_string(),
            sub_channel_id: 1,
            cookie_domain: "ticketmaster.nl".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            block_markers: vec!["Forbidden".to_string(), "blocked".to_string()],
        }
    }
}

// ============================================================================
// Agent Settings
// ============================================================================

/// How the installed agent is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTransportKind {
    /// POST the message envelope to a running agent.
    #[default]
    Http,
    /// Read installed browsers' cookie stores in-process.
    Local,
}

impl FromStr for AgentTransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown agent transport: {other}")),
        }
    }
}

/// Settings for the installed agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Transport.
    pub transport: AgentTransportKind,
    /// Agent endpoint for the HTTP transport.
    pub url: String,
    /// Browser profile names the local transport searches, in order.
    pub browsers: Vec<String>,
    /// Per-message timeout.
    pub timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            transport: AgentTransportKind::Http,
            url: "http://127.0.0.1:9333/message".to_string(),
            browsers: Vec::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Session Settings
// ============================================================================

/// Provider selection plus the static credential.
#[derive(Clone)]
pub struct SessionSettings {
    /// Primary provider.
    pub provider: ProviderKind,
    /// Optional fallback provider.
    pub fallback: Option<ProviderKind>,
    /// Pre-provisioned credential, fixed for the process lifetime.
    pub static_cookie: Option<Arc<str>>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Browser,
            fallback: None,
            static_cookie: None,
        }
    }
}

impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("provider", &self.provider)
            .field("fallback", &self.fallback)
            .field("static_cookie_set", &self.static_cookie.is_some())
            .finish()
    }
}

// ============================================================================
// Pipeline Settings
// ============================================================================

/// Everything a pipeline run needs to know about the deployment.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    /// Overall request deadline.
    pub request_timeout: Duration,
    /// Credential plausibility rules.
    pub credential_policy: CredentialPolicy,
    /// Proxy for browser and HTTP traffic.
    pub proxy: Option<ProxyConfig>,
    /// Provider selection.
    pub session: SessionSettings,
    /// Browser automation.
    pub browser: BrowserSettings,
    /// Vendor API.
    pub vendor: VendorSettings,
    /// Installed agent.
    pub agent: AgentSettings,
}

impl PipelineSettings {
    /// Creates a builder.
    pub fn builder() -> PipelineSettingsBuilder {
        PipelineSettingsBuilder::new()
    }

    /// Returns the providers in the order they are tried.
    pub fn provider_order(&self) -> Vec<ProviderKind> {
        let mut order = vec![self.session.provider];
        if let Some(fallback) = self.session.fallback.filter(|f| *f != self.session.provider) {
            order.push(fallback);
        }
        order
    }
}

// ============================================================================
// Pipeline Settings Builder
// ============================================================================

/// Builder for [`PipelineSettings`].
#[derive(Debug)]
pub struct PipelineSettingsBuilder {
    settings: PipelineSettings,
}

impl PipelineSettingsBuilder {
    /// Creates a builder with defaults.
    pub fn new() -> Self {
        Self {
            settings: PipelineSettings {
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
                ..PipelineSettings::default()
            },
        }
    }

    /// Sets the overall request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    /// Sets the minimum plausible cookie length.
    pub fn min_cookie_length(mut self, length: usize) -> Self {
        self.settings.credential_policy = CredentialPolicy::with_min_length(length);
        self
    }

    /// Sets the proxy.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.settings.proxy = Some(proxy);
        self
    }

    /// Sets the primary provider.
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.settings.session.provider = provider;
        self
    }

    /// Sets the fallback provider.
    pub fn fallback(mut self, fallback: ProviderKind) -> Self {
        self.settings.session.fallback = Some(fallback);
        self
    }

    /// Sets the static credential.
    pub fn static_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.settings.session.static_cookie = Some(Arc::from(cookie.into()));
        self
    }

    /// Sets browser settings.
    pub fn browser(mut self, browser: BrowserSettings) -> Self {
        self.settings.browser = browser;
        self
    }

    /// Sets vendor settings.
    pub fn vendor(mut self, vendor: VendorSettings) -> Self {
        self.settings.vendor = vendor;
        self
    }

    /// Points the vendor API at a different origin.
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.settings.vendor.api_base = api_base.into();
        self
    }

    /// Sets agent settings.
    pub fn agent(mut self, agent: AgentSettings) -> Self {
        self.settings.agent = agent;
        self
    }

    /// Builds the settings.
    pub fn build(self) -> PipelineSettings {
        self.settings
    }
}

impl Default for PipelineSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("browser".parse::<ProviderKind>(), Ok(ProviderKind::Browser));
        assert_eq!("Static".parse::<ProviderKind>(), Ok(ProviderKind::Static));
        assert_eq!("extension".parse::<ProviderKind>(), Ok(ProviderKind::Agent));
        assert_eq!(
            "magic".parse::<ProviderKind>().unwrap_err(),
            "unknown session provider: magic (expected one of browser, agent, static, caller)"
        );
    }

    #[test]
    fn test_builder_defaults() {
        let settings = PipelineSettings::builder().build();
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(settings.credential_policy.min_length, 200);
        assert_eq!(settings.session.provider, ProviderKind::Browser);
        assert_eq!(settings.browser.viewport_width, 1920);
        assert_eq!(settings.browser.viewport_height, 1080);
        assert_eq!(settings.browser.max_concurrent, 2);
        assert_eq!(settings.vendor.region, "TM_NL");
    }

    #[test]
    fn test_provider_order() {
        let settings = PipelineSettings::builder()
            .provider(ProviderKind::Caller)
            .fallback(ProviderKind::Static)
            .build();
        assert_eq!(
            settings.provider_order(),
            vec![ProviderKind::Caller, ProviderKind::Static]
        );

        let settings = PipelineSettings::builder()
            .provider(ProviderKind::Static)
            .fallback(ProviderKind::Static)
            .build();
        assert_eq!(settings.provider_order(), vec![ProviderKind::Static]);
    }

    #[test]
    fn test_session_debug_hides_static_cookie() {
        let settings = PipelineSettings::builder()
            .static_cookie("secret=value")
            .build();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("secret=value"));
        assert!(debug.contains("static_cookie_set: true"));
    }

    #[test]
    fn test_wait_condition_parse() {
        assert_eq!(
            "domcontentloaded".parse::<WaitCondition>(),
            Ok(WaitCondition::DomContentLoaded)
        );
        assert_eq!(
            "networkidle2".parse::<WaitCondition>(),
            Ok(WaitCondition::NetworkIdle)
        );
    }
}
