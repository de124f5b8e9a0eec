//! Host APIs for system interactions.
//!
//! - [`http`] - HTTP client with tracing, proxy, and domain allowlist
//! - [`chromium`] - Chromium automation behind the browser traits
//! - [`cookie_store`] - Cookie import from installed browser profiles

pub mod chromium;
pub mod cookie_store;
pub mod http;
