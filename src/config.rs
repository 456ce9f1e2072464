// ⚙️ Configuration - environment first, logged defaults second

use anyhow::{anyhow, Result};
use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend database (members, profiles, reference data)
    pub db_path: PathBuf,

    /// Device key-value store (contact unlock flags)
    pub device_db_path: PathBuf,

    pub port: u16,

    /// Where gallery and profile images are written
    pub upload_dir: PathBuf,

    /// Remote server base URL, e.g. `http://localhost:3000`.
    /// `None` means the wizard talks to the local database directly.
    pub api_url: Option<String>,

    /// Bearer token for the remote API
    pub token: Option<String>,

    pub http_timeout: Duration,

    /// Required by every admin route; `None` locks the admin surface
    pub admin_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            db_path: try_load("MATCHMAKER_DB", "matchmaker.db")?,
            device_db_path: try_load("MATCHMAKER_DEVICE_DB", "device.db")?,
            port: try_load("MATCHMAKER_PORT", "3000")?,
            upload_dir: try_load("MATCHMAKER_UPLOAD_DIR", "uploads")?,
            api_url: optional("MATCHMAKER_API_URL"),
            token: optional("MATCHMAKER_TOKEN"),
            http_timeout: Duration::from_secs(try_load("MATCHMAKER_HTTP_TIMEOUT_SECS", "30")?),
            admin_key: optional("MATCHMAKER_ADMIN_KEY").or_else(|| read_secret("MATCHMAKER_ADMIN_KEY")),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("matchmaker.db"),
            device_db_path: PathBuf::from("device.db"),
            port: 3000,
            upload_dir: PathBuf::from("uploads"),
            api_url: None,
            token: None,
            http_timeout: Duration::from_secs(30),
            admin_key: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn optional(key: &str) -> Option<String> {
    let value = var(key);
    if value.is_none() {
        info!("{key} not set");
    }
    value
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("Environment misconfigured: {key}: {e}")
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}
