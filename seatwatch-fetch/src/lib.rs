// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Seatwatch Fetch
//!
//! Session acquisition and authenticated retrieval for the `Seatwatch`
//! availability pipeline.
//!
//! ## Host APIs
//!
//! The [`host`] module wraps everything that touches the outside world:
//!
//! - [`host::http`] - HTTP client with tracing, proxy routing and domain allowlist
//! - [`host::chromium`] - Chromium automation via the DevTools protocol
//! - [`host::cookie_store`] - Cookie databases of installed browsers
//!
//! ## Session Acquisition
//!
//! - [`session::SessionProvider`] - Trait for the four credential sources
//! - [`session::SessionChain`] - Primary provider plus optional fallback
//! - [`browser::BrowserScope`] - Bounded, always-closed browser lifetime
//! - [`agent`] - Message channel to an installed agent
//!
//! ## Retrieval
//!
//! - [`retrieval::RetrievalExecutor`] - The authenticated availability request
//! - [`classify`] - Response classification and block detection
//! - [`pipeline::AvailabilityPipeline`] - Runs a request end to end
//!
//! ## Example
//!
//! ```ignore
//! use seatwatch_core::EventRequest;
//! use seatwatch_fetch::{AvailabilityPipeline, PipelineSettings, ProviderKind};
//!
//! let settings = PipelineSettings::builder()
//!     .provider(ProviderKind::Caller)
//!     .fallback(ProviderKind::Static)
//!     .static_cookie(std::env::var("TM_COOKIE")?)
//!     .build();
//! let pipeline = AvailabilityPipeline::from_settings(settings)?;
//!
//! let request = EventRequest::new("https://www.ticketmaster.nl/event/example-9999");
//! let payload = pipeline.run(&request).await?;
//! ```

pub mod agent;
pub mod browser;
pub mod classify;
pub mod context;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod retrieval;
pub mod session;

#[cfg(test)]
mod testing;

// Errors
pub use error::{AgentError, BrowserError, CookieStoreError, FetchError, HttpError, SessionError};

// Host APIs
pub use host::{
    chromium::ChromiumLauncher,
    cookie_store::{Cookie, CookieStore, InstalledBrowser},
    http::HttpClient,
};

// Settings
pub use context::{
    AgentSettings, AgentTransportKind, BrowserSettings, PipelineSettings, PipelineSettingsBuilder,
    ProviderKind, SessionSettings, VendorSettings, WaitCondition,
};

// Session & Retrieval
pub use browser::{BrowserLauncher, BrowserScope, BrowserSession, LaunchOptions};
pub use classify::{classify, AnyBlockDetector, BlockDetector, SubstringBlockDetector};
pub use pipeline::{AvailabilityPipeline, PipelineOutcome, PipelineStage};
pub use retrieval::{RetrievalExecutor, VendorEndpoint};
pub use session::{SessionAttempt, SessionChain, SessionOutcome, SessionProvider};
