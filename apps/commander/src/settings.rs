//! Where the driver finds its config and logs, and how the environment
//! overrides them.
//!
//! # Resolution order
//!
//! 1. `.env` in the current directory, then next to the executable
//! 2. `COMMANDER_CONFIG_DIR`, else the platform config dir + `commander`
//! 3. `commander.json` in that directory (defaults if absent)
//! 4. `COMMANDER_ENDPOINT` replaces the configured endpoint

use crate::error::CommanderError;

use commander_client::ClientConfig;

use common::ErrorLocation;

use std::env;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

pub const CONFIG_DIR_ENV: &str = "COMMANDER_CONFIG_DIR";
pub const ENDPOINT_ENV: &str = "COMMANDER_ENDPOINT";

const APP_DIR_NAME: &str = "commander";

/// Loads `.env` from known locations. Returns the file that was loaded.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return Some(path);
    }

    let exe_dir = env::current_exe().ok()?.parent()?.to_path_buf();
    let env_path = exe_dir.join(".env");
    if !env_path.exists() {
        return None;
    }

    match dotenvy::from_path(&env_path) {
        Ok(()) => {
            info!("Loaded .env from: {:?}", env_path);
            Some(env_path)
        }
        Err(e) => {
            warn!("Failed to parse .env at {:?}: {}", env_path, e);
            None
        }
    }
}

/// Directory holding `commander.json`.
///
/// # Errors
///
/// Returns [`CommanderError::Commander`] if no override is set and the
/// platform has no config directory.
pub fn config_dir() -> Result<PathBuf, CommanderError> {
    if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
        info!("Using {CONFIG_DIR_ENV} override: {custom_dir}");
        return Ok(PathBuf::from(custom_dir));
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| CommanderError::Commander {
            message: "Could not determine a config directory".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}

/// Directory for `commander.log`, created if missing.
///
/// # Errors
///
/// Returns [`CommanderError::Commander`] if the directory cannot be created.
pub fn log_dir() -> Result<PathBuf, CommanderError> {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join(APP_DIR_NAME)
        .join("logs");

    std::fs::create_dir_all(&dir).map_err(|e| CommanderError::Commander {
        message: format!("Failed to create log directory {}: {e}", dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    Ok(dir)
}

/// Replace the endpoint when an override is given. Blank overrides are ignored.
pub fn apply_endpoint_override(config: ClientConfig, endpoint: Option<String>) -> ClientConfig {
    match endpoint.map(|e| e.trim().to_string()) {
        Some(endpoint) if !endpoint.is_empty() => {
            info!("Using {ENDPOINT_ENV} override: {endpoint}");
            ClientConfig { endpoint, ..config }
        }
        _ => config,
    }
}

/// Load the client config from `dir` and apply the endpoint override.
///
/// # Errors
///
/// Returns [`CommanderError::Client`] if the file is unreadable or the
/// resulting config does not validate.
pub fn load_config(dir: &Path, endpoint_override: Option<String>) -> Result<ClientConfig, CommanderError> {
    let config = ClientConfig::load(dir).map_err(|e| CommanderError::Client {
        message: format!("Failed to load config: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let config = apply_endpoint_override(config, endpoint_override);

    config.validate().map_err(|e| CommanderError::Client {
        message: format!("Invalid config: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    debug!("Resolved client config: {config:?}");
    Ok(config)
}

/// Full resolution: `.env`, config directory, file, then `COMMANDER_ENDPOINT`.
///
/// # Errors
///
/// See [`config_dir`] and [`load_config`].
pub fn resolve() -> Result<ClientConfig, CommanderError> {
    load_dotenv();
    let dir = config_dir()?;
    load_config(&dir, env::var(ENDPOINT_ENV).ok())
}
