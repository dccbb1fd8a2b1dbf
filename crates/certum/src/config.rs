use certum_core::Identity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RootError, RootResult};

/// Upper bound on a single sweep batch.
pub const MAX_SWEEP_BATCH: usize = 10_000;

/// Transport protocol for the JSON-RPC server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout.
    #[default]
    Stdio,
    /// HTTP transport with bind address and port.
    Http { bind: String, port: u16 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub transport: Transport,
}

/// Configuration for the timer-driven expiration sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepConfig {
    /// Whether `serve` runs the sweep task at all.
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,

    /// Seconds between sweep ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Active entries scanned per tick.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_max_batch() -> usize {
    100
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_interval_secs(),
            max_batch: default_max_batch(),
        }
    }
}

/// Top-level configuration for the Certum binary.
///
/// Loaded from a TOML file (typically `~/.certum/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// The one identity allowed to change the issuer roster. Must be set
    /// before the registry can start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superadmin: Option<Identity>,

    /// Data directory for Certum state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub sweep: SweepConfig,
}

fn default_data_dir() -> PathBuf {
    dirs_or_default(".certum")
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            superadmin: None,
            data_dir: default_data_dir(),
            server: ServerConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.sweep.interval_secs == 0 {
            return Err(RootError::Config("sweep.interval_secs must be > 0".into()));
        }
        if self.sweep.max_batch == 0 || self.sweep.max_batch > MAX_SWEEP_BATCH {
            return Err(RootError::Config(format!(
                "sweep.max_batch must be between 1 and {}, got {}",
                MAX_SWEEP_BATCH, self.sweep.max_batch
            )));
        }
        if let Transport::Http { bind, .. } = &self.server.transport {
            if bind.trim().is_empty() {
                return Err(RootError::Config("server.transport.http.bind must not be empty".into()));
            }
        }
        Ok(())
    }

    /// The configured superadmin, or a configuration error telling the
    /// operator how to set one.
    pub fn require_superadmin(&self) -> RootResult<&Identity> {
        self.superadmin.as_ref().ok_or_else(|| {
            RootError::Config(
                "superadmin is not configured; run `certum init --superadmin <address>`".into(),
            )
        })
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".certum/config.toml")
    }
}
