//! Backend configuration.
//!
//! Resolution order: built-in defaults, then `sleuth.toml` (if present), then
//! the `SLEUTH_API_URL` environment variable. Callers may override further.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sleuth_core::{SleuthError, SleuthResult};

/// Default notation service URL.
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Default transport timeout for one service call.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the notation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Contents of `sleuth.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleuthConfig {
    #[serde(default)]
    pub backend: BackendConfig,
}

impl SleuthConfig {
    pub const FILE_NAME: &'static str = "sleuth.toml";
    pub const API_URL_ENV: &'static str = "SLEUTH_API_URL";

    pub fn from_toml_str(content: &str) -> SleuthResult<Self> {
        toml::from_str(content).map_err(|e| SleuthError::config(format!("invalid {}: {}", Self::FILE_NAME, e)))
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `sleuth.toml` in `dir` is
    /// used when present and defaults otherwise.
    pub fn load(path: Option<&Path>, dir: &Path) -> SleuthResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_toml_str(&std::fs::read_to_string(p)?)?,
            None => {
                let candidate = dir.join(Self::FILE_NAME);
                if candidate.is_file() {
                    Self::from_toml_str(&std::fs::read_to_string(&candidate)?)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(url) = std::env::var(Self::API_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend.base_url = url;
            }
        }

        debug!(base_url = %config.backend.base_url, timeout_secs = config.backend.timeout_secs, "Configuration loaded");
        Ok(config)
    }
}
