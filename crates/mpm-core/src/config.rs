use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use mpm_util::errors::MpmError;

/// Registry used when neither the config file nor the environment names one.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Environment variable overriding `[registry] url`.
pub const REGISTRY_ENV: &str = "MPM_REGISTRY";

/// Global user configuration loaded from `~/.mpm/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

/// Registry settings from `[registry]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry")]
    pub url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry(),
        }
    }
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

/// Network settings from `[network]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(
        default = "default_max_concurrent_fetches",
        rename = "max-concurrent-fetches"
    )]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_timeout_secs", rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_timeout_secs() -> u64 {
    60
}

impl GlobalConfig {
    /// Load the global configuration from `~/.mpm/config.toml`, or return
    /// defaults if the file doesn't exist. `MPM_REGISTRY` overrides the
    /// registry URL either way.
    pub fn load() -> miette::Result<Self> {
        let mut config = Self::from_path(&Self::default_path())?;
        if let Ok(url) = std::env::var(REGISTRY_ENV) {
            if !url.trim().is_empty() {
                config.registry.url = url;
            }
        }
        Ok(config)
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn from_path(path: &Path) -> miette::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| MpmError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> miette::Result<Self> {
        toml::from_str(content).map_err(|e| {
            MpmError::Config {
                message: format!("Failed to parse global config: {e}"),
            }
            .into()
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// The registry base URL without a trailing slash.
    pub fn registry_url(&self) -> &str {
        self.registry.url.trim_end_matches('/')
    }
}

/// Returns the path to the mpm data directory (`~/.mpm/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".mpm")
}
