//! File persistence helpers.
//!
//! The config file may hold a session cookie and proxy credentials, so it
//! is written owner-only.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - macOS: `~/Library/Application Support/seatwatch`
/// - Linux: `~/.config/seatwatch`
/// - Windows: `%APPDATA%\seatwatch`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join("seatwatch"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

// ============================================================================
// Permissions
// ============================================================================

#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(mode);
    tokio::fs::set_permissions(path, perms).await?;
    debug!(path = %path.display(), mode = %format!("{mode:o}"), "Restricted permissions");
    Ok(())
}

#[cfg(not(unix))]
async fn restrict(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Creates `path` owner-only if it does not exist.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !path.exists() {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        restrict(path, 0o700).await?;
    }
    Ok(())
}

/// Writes `data` as TOML, atomically, with 0600 permissions on Unix.
///
/// # Errors
///
/// Returns [`StoreError`] if serialization or any file operation fails.
pub async fn save_toml<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    let content = toml::to_string_pretty(data)?;
    let temp_path = path.with_extension("toml.tmp");
    tokio::fs::write(&temp_path, &content).await?;
    restrict(&temp_path, 0o600).await?;
    tokio::fs::rename(&temp_path, path).await?;

    debug!(path = %path.display(), "Config written");
    Ok(())
}

/// Loads `.env` from the working directory or its parents.
///
/// A missing file is not an error.
///
/// # Errors
///
/// Returns [`StoreError::Env`] if a `.env` file exists but cannot be parsed.
pub fn load_dotenv() -> Result<Option<PathBuf>, StoreError> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded .env");
            Ok(Some(path))
        }
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Tests
// ============================================================================
