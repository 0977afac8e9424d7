//! Configuration loading and runtime paths.
//!
//! Everything lives under `~/.segcast/`:
//! - `config.toml`: bridge URL, contact normalization, dispatch delays
//! - `contacts/`: one `<GROUP>.txt` file per group
//! - `media/`: campaign attachments
//! - `logs/`: rotated JSON logs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::contacts::normalizer::{DEFAULT_COUNTRY_PREFIX, DEFAULT_DOMAIN_SUFFIX};
use crate::transport::bridge::DEFAULT_BRIDGE_URL;

/// Top-level configuration. Every section is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// WhatsApp bridge sidecar.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Contact storage and normalization.
    #[serde(default)]
    pub contacts: ContactsConfig,

    /// Media slot storage.
    #[serde(default)]
    pub media: MediaConfig,

    /// Send loop throttling.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Bridge sidecar settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Base URL of the bridge HTTP API.
    #[serde(default = "default_bridge_url")]
    pub url: String,

    /// Seconds `send` waits for the bridge to report ready.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Display name reported in status output.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            ready_timeout_secs: default_ready_timeout(),
            sender_name: default_sender_name(),
        }
    }
}

/// Contact storage and normalization settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct ContactsConfig {
    /// Override for the contacts directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Country code prepended to 10-digit numbers.
    #[serde(default = "default_country_prefix")]
    pub country_prefix: String,

    /// Domain suffix of a recipient address.
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            country_prefix: default_country_prefix(),
            domain_suffix: default_domain_suffix(),
        }
    }
}

/// Media storage settings.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Override for the media directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Pauses after each send attempt, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// After a successful non-video send.
    #[serde(default = "default_success_delay")]
    pub success_delay_ms: u64,

    /// After a successful video send.
    #[serde(default = "default_video_success_delay")]
    pub video_success_delay_ms: u64,

    /// After a failed send.
    #[serde(default = "default_failure_delay")]
    pub failure_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            success_delay_ms: default_success_delay(),
            video_success_delay_ms: default_video_success_delay(),
            failure_delay_ms: default_failure_delay(),
        }
    }
}

// Default value functions for serde

fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_owned()
}
fn default_ready_timeout() -> u64 {
    30
}
fn default_sender_name() -> String {
    "segcast".to_owned()
}
fn default_country_prefix() -> String {
    DEFAULT_COUNTRY_PREFIX.to_owned()
}
fn default_domain_suffix() -> String {
    DEFAULT_DOMAIN_SUFFIX.to_owned()
}
fn default_success_delay() -> u64 {
    3000
}
fn default_video_success_delay() -> u64 {
    5000
}
fn default_failure_delay() -> u64 {
    5000
}

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Load the config, falling back to defaults when the file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Resolve the default config directory (`~/.segcast/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".segcast"))
}

/// Filesystem layout used at runtime.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Root directory.
    pub root: PathBuf,
    /// `config.toml` path.
    pub config_toml: PathBuf,
    /// Group files directory.
    pub contacts_dir: PathBuf,
    /// Media uploads directory.
    pub media_dir: PathBuf,
    /// Log directory.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Layout rooted at `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            config_toml: root.join("config.toml"),
            contacts_dir: root.join("contacts"),
            media_dir: root.join("media"),
            logs_dir: root.join("logs"),
        }
    }

    /// Apply directory overrides from the config.
    #[must_use]
    pub fn with_overrides(mut self, config: &Config) -> Self {
        if let Some(dir) = &config.contacts.dir {
            self.contacts_dir.clone_from(dir);
        }
        if let Some(dir) = &config.media.dir {
            self.media_dir.clone_from(dir);
        }
        self
    }
}

/// Default runtime layout under [`config_dir`].
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::under(&config_dir()?))
}
