// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Seatwatch Store
//!
//! Configuration loading for `Seatwatch`.
//!
//! - **Config**: TOML file with `.env` and environment overrides
//! - **Persistence**: Default paths and owner-only file writes
//!
//! ## Usage
//!
//! ```ignore
//! use seatwatch_store::{load_dotenv, Config};
//!
//! load_dotenv()?;
//! let settings = Config::load(None)?.to_settings()?;
//! ```

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    AgentConfig, BrowserConfig, Config, GeneralConfig, ProxySection, SessionConfig, VendorConfig,
    ENV_AGENT_URL, ENV_PROVIDER, ENV_PROXY, ENV_STATIC_COOKIE,
};
pub use error::StoreError;
pub use persistence::{default_config_dir, default_config_path, ensure_dir, load_dotenv, save_toml};
