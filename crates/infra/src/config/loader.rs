//! Configuration loader
//!
//! Assembles the client configuration from files and environment variables.
//!
//! ## Loading Strategy
//! 1. Probes multiple paths for a config file (JSON or TOML)
//! 2. Applies environment variable overrides on top
//! 3. Sanitizes invalid values back to the documented defaults
//!
//! Missing or invalid values never fail startup; they fall back to the safe
//! defaults with a warning.
//!
//! ## Environment Variables
//! - `CHARGEGUARD_ENDPOINT`: Payment provider base URL
//! - `CHARGEGUARD_TIMEOUT_MS`: Per-attempt timeout in milliseconds
//! - `CHARGEGUARD_RETRY_ATTEMPTS`: Attempts per charge
//! - `CHARGEGUARD_RETRY_DELAY_MS`: Base retry delay in milliseconds
//! - `CHARGEGUARD_BACKOFF_MULTIPLIER`: Exponential backoff multiplier
//! - `CHARGEGUARD_JITTER_MS`: Maximum backoff jitter in milliseconds
//! - `CHARGEGUARD_FAILURE_THRESHOLD`: Breaker failure threshold
//! - `CHARGEGUARD_RECOVERY_TIMEOUT_MS`: Breaker recovery timeout
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./chargeguard.json` or `./chargeguard.toml`
//! 3. Parent directories (up to 2 levels)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chargeguard_domain::{ChargeGuardError, ClientConfig, Result};
use tracing::{debug, info, warn};

/// Load configuration with automatic fallback strategy
///
/// Never fails: a missing or unparseable file yields the defaults, and
/// every environment override or file value that does not survive
/// validation is replaced by its documented default.
pub fn load() -> ClientConfig {
    let mut config = match probe_config_paths() {
        Some(path) => match load_from_file(&path) {
            Ok(config) => {
                info!(path = %path.display(), "configuration loaded from file");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable config file");
                ClientConfig::default()
            }
        },
        None => {
            debug!("no config file found, starting from defaults");
            ClientConfig::default()
        }
    };

    apply_env_overrides(&mut config);

    let (config, corrected) = config.sanitize();
    if !corrected.is_empty() {
        warn!(fields = ?corrected, "invalid configuration values replaced with defaults");
    }
    config
}

/// Load configuration from a specific file
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `ChargeGuardError::Config` if the file is missing, unreadable,
/// or fails to parse.
pub fn load_from_file(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Err(ChargeGuardError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| ChargeGuardError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ChargeGuardError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ChargeGuardError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ChargeGuardError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("chargeguard.json"),
            cwd.join("chargeguard.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("chargeguard.json"),
                exe_dir.join("chargeguard.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Overlay `CHARGEGUARD_*` environment variables onto the configuration
fn apply_env_overrides(config: &mut ClientConfig) {
    if let Ok(value) = std::env::var("CHARGEGUARD_ENDPOINT") {
        config.endpoint = value;
    }
    env_parse("CHARGEGUARD_TIMEOUT_MS", &mut config.timeout_ms);
    env_parse("CHARGEGUARD_RETRY_ATTEMPTS", &mut config.retry_attempts);
    env_parse("CHARGEGUARD_RETRY_DELAY_MS", &mut config.retry_delay_ms);
    env_parse("CHARGEGUARD_BACKOFF_MULTIPLIER", &mut config.backoff_multiplier);
    env_parse("CHARGEGUARD_JITTER_MS", &mut config.jitter_ms);
    env_parse("CHARGEGUARD_FAILURE_THRESHOLD", &mut config.circuit_breaker.failure_threshold);
    env_parse(
        "CHARGEGUARD_RECOVERY_TIMEOUT_MS",
        &mut config.circuit_breaker.recovery_timeout_ms,
    );
}

/// Parse an environment variable into `slot`, keeping the current value on
/// a parse failure
fn env_parse<T: FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => warn!(%key, value = %raw, "ignoring unparseable environment override"),
        }
    }
}
