//! Cookie reading from installed browser profiles.
//!
//! Backs the local agent transport: the user's own browser already holds
//! a session that passed the vendor's challenge, so its cookie database
//! is read directly.
//!
//! ## Supported Browsers
//!
//! - **Firefox**: full support (SQLite, values stored in plaintext)
//! - **Chrome / Chromium / Brave / Edge**: plaintext values only; encrypted
//!   values are skipped

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, instrument, trace};

use crate::error::CookieStoreError;

/// Offset between the Windows and Unix epochs, in microseconds.
const WINDOWS_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

// ============================================================================
// Installed Browser
// ============================================================================

/// Browsers whose cookie databases can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstalledBrowser {
    /// Mozilla Firefox.
    Firefox,
    /// Google Chrome.
    Chrome,
    /// Open-source Chromium.
    Chromium,
    /// Brave.
    Brave,
    /// Microsoft Edge.
    Edge,
}

impl InstalledBrowser {
    /// Returns the display name for this browser.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Firefox => "Firefox",
            Self::Chrome => "Chrome",
            Self::Chromium => "Chromium",
            Self::Brave => "Brave",
            Self::Edge => "Edge",
        }
    }

    /// Returns true for Chromium-family browsers.
    pub fn is_chromium(&self) -> bool {
        !matches!(self, Self::Firefox)
    }

    /// Default search order. Firefox first since its values are never encrypted.
    pub fn default_priority() -> &'static [InstalledBrowser] {
        &[
            Self::Firefox,
            Self::Chrome,
            Self::Chromium,
            Self::Brave,
            Self::Edge,
        ]
    }

    /// Returns the cookie database path on macOS.
    #[cfg(target_os = "macos")]
    pub fn cookie_db_path(&self) -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let support = home.join("Library/Application Support");

        match self {
            Self::Firefox => {
                find_firefox_default_profile(&support.join("Firefox/Profiles"))
                    .map(|p| p.join("cookies.sqlite"))
            }
            Self::Chrome => chromium_cookie_file(&support.join("Google/Chrome/Default")),
            Self::Chromium => chromium_cookie_file(&support.join("Chromium/Default")),
            Self::Brave => {
                chromium_cookie_file(&support.join("BraveSoftware/Brave-Browser/Default"))
            }
            Self::Edge => chromium_cookie_file(&support.join("Microsoft Edge/Default")),
        }
    }

    /// Returns the cookie database path on Linux.
    #[cfg(target_os = "linux")]
    pub fn cookie_db_path(&self) -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let config = dirs::config_dir().unwrap_or_else(|| home.join(".config"));

        match self {
            Self::Firefox => find_firefox_default_profile(&home.join(".mozilla/firefox"))
                .map(|p| p.join("cookies.sqlite")),
            Self::Chrome => chromium_cookie_file(&config.join("google-chrome/Default")),
            Self::Chromium => chromium_cookie_file(&config.join("chromium/Default")),
            Self::Brave => chromium_cookie_file(&config.join("BraveSoftware/Brave-Browser/Default")),
            Self::Edge => chromium_cookie_file(&config.join("microsoft-edge/Default")),
        }
    }

    /// Returns the cookie database path on other platforms.
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    pub fn cookie_db_path(&self) -> Option<PathBuf> {
        None
    }

    /// Checks if this browser's cookie database exists.
    pub fn is_installed(&self) -> bool {
        self.cookie_db_path().is_some_and(|p| p.exists())
    }
}

impl fmt::Display for InstalledBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for InstalledBrowser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firefox" => Ok(Self::Firefox),
            "chrome" | "google-chrome" => Ok(Self::Chrome),
            "chromium" => Ok(Self::Chromium),
            "brave" => Ok(Self::Brave),
            "edge" | "microsoft-edge" => Ok(Self::Edge),
            other => Err(format!("unsupported browser: {other}")),
        }
    }
}

/// Newer Chromium builds keep cookies under `Network/`.
#[cfg(any(target_os = "macos", target_os = "linux"))]
fn chromium_cookie_file(profile: &Path) -> Option<PathBuf> {
    let network = profile.join("Network/Cookies");
    if network.exists() {
        return Some(network);
    }
    Some(profile.join("Cookies"))
}

/// Find the default Firefox profile directory.
#[cfg(any(target_os = "macos", target_os = "linux"))]
fn find_firefox_default_profile(profiles_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(profiles_dir).ok()?;

    let mut default_profile: Option<PathBuf> = None;
    let mut any_profile: Option<PathBuf> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".default-release") {
            return Some(path);
        } else if name.ends_with(".default") {
            default_profile = Some(path);
        } else {
            any_profile = Some(path);
        }
    }

    default_profile.or(any_profile)
}

// ============================================================================
// Cookie
// ============================================================================

/// A browser cookie.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie belongs to.
    pub domain: String,
    /// Path the cookie is valid for.
    pub path: String,
    /// Expiration time.
    pub expires: Option<DateTime<Utc>>,
    /// Whether the cookie requires HTTPS.
    pub secure: bool,
    /// Whether the cookie is HTTP-only.
    pub http_only: bool,
}

impl Cookie {
    /// Creates a session cookie on `/`.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires: None,
            secure: true,
            http_only: false,
        }
    }

    /// Returns true if the cookie is expired.
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|exp| exp < Utc::now())
    }

    /// Returns true if this cookie is sent to `domain` or one of its subdomains.
    pub fn matches_domain(&self, domain: &str) -> bool {
        let cookie_domain = self.domain.trim_start_matches('.');
        let domain = domain.trim_start_matches('.');
        domain == cookie_domain
            || domain.ends_with(&format!(".{cookie_domain}"))
            || cookie_domain.ends_with(&format!(".{domain}"))
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .finish_non_exhaustive()
    }
}

/// Build a cookie header string for HTTP requests.
pub fn cookies_to_header(cookies: &[Cookie]) -> String {
    seatwatch_core::join_cookie_pairs(cookies.iter().map(|c| (c.name.as_str(), c.value.as_str())))
}

// ============================================================================
// Cookie Store
// ============================================================================

/// Reads cookies from installed browsers in priority order.
#[derive(Debug, Clone)]
pub struct CookieStore {
    priority: Vec<InstalledBrowser>,
}

impl CookieStore {
    /// Creates a store using the default browser order.
    pub fn new() -> Self {
        Self {
            priority: InstalledBrowser::default_priority().to_vec(),
        }
    }

    /// Creates a store searching only `browsers`, in order.
    pub fn with_browsers(browsers: Vec<InstalledBrowser>) -> Self {
        if browsers.is_empty() {
            return Self::new();
        }
        Self { priority: browsers }
    }

    /// Returns the search order.
    pub fn priority(&self) -> &[InstalledBrowser] {
        &self.priority
    }

    /// Reads the unexpired cookies one browser holds for `domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is missing, unreadable, or holds no
    /// cookies for the domain.
    #[instrument(skip(self), fields(browser = %browser))]
    pub async fn domain_cookies(
        &self,
        browser: InstalledBrowser,
        domain: &str,
    ) -> Result<Vec<Cookie>, CookieStoreError> {
        let db_path = browser
            .cookie_db_path()
            .ok_or_else(|| CookieStoreError::BrowserNotFound(browser.to_string()))?;
        if !db_path.exists() {
            return Err(CookieStoreError::DatabaseNotFound {
                browser: browser.to_string(),
                path: db_path.display().to_string(),
            });
        }

        let schema = CookieSchema::for_browser(browser);
        let host = domain.trim_start_matches('.').to_string();
        let rows = tokio::task::spawn_blocking(move || schema.read(&db_path, &host))
            .await
            .map_err(|e| CookieStoreError::ReadFailed(format!("reader task failed: {e}")))??;

        let cookies: Vec<Cookie> = rows
            .into_iter()
            .filter(|c| !c.is_expired() && c.matches_domain(domain))
            .collect();
        if cookies.is_empty() {
            return Err(CookieStoreError::NoCookiesFound(domain.to_string()));
        }

        debug!(count = cookies.len(), "Domain cookies read");
        Ok(cookies)
    }

    /// Reads `domain` cookies from the first browser in priority order that
    /// has any.
    ///
    /// # Errors
    ///
    /// Returns the last browser's error, or
    /// [`CookieStoreError::NoBrowsersAvailable`] if no database exists.
    #[instrument(skip(self))]
    pub async fn first_domain_cookies(
        &self,
        domain: &str,
    ) -> Result<(InstalledBrowser, Vec<Cookie>), CookieStoreError> {
        let mut last_error = None;

        for browser in self.priority.iter().copied().filter(InstalledBrowser::is_installed) {
            match self.domain_cookies(browser, domain).await {
                Ok(cookies) => return Ok((browser, cookies)),
                Err(e) => {
                    trace!(browser = %browser, error = %e, "No usable cookies");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(CookieStoreError::NoBrowsersAvailable))
    }
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Database Schemas
// ============================================================================

/// Where a browser family keeps its cookie columns.
#[derive(Debug, Clone, Copy)]
struct CookieSchema {
    query: &'static str,
    /// Converts the stored expiry into Unix seconds; `None` for session cookies.
    expiry: fn(i64) -> Option<i64>,
}

impl CookieSchema {
    const FIREFOX: Self = Self {
        query: "SELECT name, value, host, path, expiry, isSecure, isHttpOnly \
                FROM moz_cookies WHERE host LIKE ?1",
        expiry: |secs| (secs > 0).then_some(secs),
    };

    // Chromium stores microseconds since 1601; encrypted rows have empty `value`.
    const CHROMIUM: Self = Self {
        query: "SELECT name, value, host_key, path, expires_utc, is_secure, is_httponly \
                FROM cookies WHERE host_key LIKE ?1 AND value != ''",
        expiry: |micros| (micros > 0).then(|| (micros - WINDOWS_EPOCH_OFFSET_MICROS) / 1_000_000),
    };

    fn for_browser(browser: InstalledBrowser) -> Self {
        if browser.is_chromium() {
            Self::CHROMIUM
        } else {
            Self::FIREFOX
        }
    }

    /// Reads rows whose host ends with `host` from a private copy of the
    /// database, since the browser may hold it locked.
    fn read(&self, db_path: &Path, host: &str) -> Result<Vec<Cookie>, CookieStoreError> {
        debug!(path = %db_path.display(), "Reading cookie database");

        let copy = tempfile::Builder::new()
            .prefix("seatwatch_cookies_")
            .suffix(".sqlite")
            .tempfile()?;
        std::fs::copy(db_path, copy.path())
            .map_err(|e| CookieStoreError::ReadFailed(format!("copy failed: {e}")))?;
        let conn = Connection::open_with_flags(copy.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| CookieStoreError::ReadFailed(format!("open failed: {e}")))?;

        let mut stmt = conn
            .prepare(self.query)
            .map_err(|e| CookieStoreError::ReadFailed(format!("unexpected schema: {e}")))?;
        let convert = self.expiry;
        let cookies = stmt
            .query_map([format!("%{host}")], |row| {
                Ok(Cookie {
                    name: row.get(0)?,
                    value: row.get(1)?,
                    domain: row.get(2)?,
                    path: row.get(3)?,
                    expires: convert(row.get(4)?)
                        .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
                    secure: row.get::<_, i64>(5)? != 0,
                    http_only: row.get::<_, i64>(6)? != 0,
                })
            })
            .map_err(|e| CookieStoreError::ReadFailed(format!("query failed: {e}")))?
            .filter_map(Result::ok)
            .collect();

        Ok(cookies)
    }
}

// ============================================================================
// Tests
// ============================================================================
