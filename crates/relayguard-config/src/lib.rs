//! Configuration for the relayguard CLI.
//!
//! TOML file + `RELAYGUARD_*` environment layering, per-device auth key
//! resolution (env + keyring + plaintext), and translation into the
//! `relayguard_core` runtime configs. A device whose key cannot be resolved
//! is kept and surfaces as "config incomplete" rather than failing the load.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use relayguard_api::{TlsMode, TransportConfig};
use relayguard_core::{
    CoreConfig, Device, MonitorConfig, OptimisticCommandPolicy, PollingConfig, QueueConfig,
    StalenessEvaluator, VendorConfig,
};

/// Keyring service name; entries are stored as `<device id>/auth-key`.
pub const KEYRING_SERVICE: &str = "relayguard";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub polling: PollingSection,

    #[serde(default)]
    pub vendor: VendorSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub staleness: StalenessSection,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// `[queue]`: the process-wide admission gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSection {
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Reject work beyond this many waiting items. Unset = unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_depth: None,
        }
    }
}

fn default_min_delay_ms() -> u64 {
    2200
}

/// `[polling]`: per-device pollers in standalone mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingSection {
    #[serde(default = "default_base_interval_secs")]
    pub base_interval_secs: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    #[serde(default = "default_success_jitter_ms")]
    pub success_jitter_ms: u64,

    #[serde(default = "default_initial_jitter_ms")]
    pub initial_jitter_ms: u64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            base_interval_secs: default_base_interval_secs(),
            max_delay_secs: default_max_delay_secs(),
            success_jitter_ms: default_success_jitter_ms(),
            initial_jitter_ms: default_initial_jitter_ms(),
        }
    }
}

fn default_base_interval_secs() -> u64 {
    15
}
fn default_max_delay_secs() -> u64 {
    60
}
fn default_success_jitter_ms() -> u64 {
    2000
}
fn default_initial_jitter_ms() -> u64 {
    4000
}

/// `[vendor]`: HTTP client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VendorSection {
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Report relay commands that got no HTTP answer as "command sent".
    #[serde(default = "default_true")]
    pub optimistic_commands: bool,

    #[serde(default)]
    pub relay_channel: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Extra CA certificate (PEM) for the vendor endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for VendorSection {
    fn default() -> Self {
        Self {
            status_timeout_secs: default_status_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            optimistic_commands: true,
            relay_channel: 0,
            user_agent: None,
            ca_cert: None,
        }
    }
}

fn default_status_timeout_secs() -> u64 {
    6
}
fn default_command_timeout_secs() -> u64 {
    8
}
fn default_true() -> bool {
    true
}

/// `[monitor]`: the central sweep process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_inter_device_delay_ms")]
    pub inter_device_delay_ms: u64,

    #[serde(default = "default_true")]
    pub retry_on_429: bool,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,

    /// Pace through the process-wide queue instead of a fixed inter-device delay.
    #[serde(default)]
    pub share_queue: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            inter_device_delay_ms: default_inter_device_delay_ms(),
            retry_on_429: true,
            retry_delay_ms: default_retry_delay_ms(),
            budget_secs: default_budget_secs(),
            share_queue: false,
            store_path: None,
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}
fn default_inter_device_delay_ms() -> u64 {
    2000
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_budget_secs() -> u64 {
    60
}

/// `[staleness]`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StalenessSection {
    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: u64,
}

impl Default for StalenessSection {
    fn default() -> Self {
        Self {
            threshold_secs: default_threshold_secs(),
        }
    }
}

fn default_threshold_secs() -> u64 {
    300
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Vendor cloud base URL, e.g. "https://shelly-42-eu.shelly.cloud".
    #[serde(default)]
    pub server_url: String,

    /// Vendor-side device id.
    #[serde(default)]
    pub device_id: String,

    /// Auth key (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,

    /// Environment variable holding the auth key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key_env: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "relayguard", "relayguard").map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the shared status file.
pub fn default_store_path() -> PathBuf {
    ProjectDirs::from("dev", "relayguard", "relayguard").map_or_else(
        || dirs_fallback().join("status.json"),
        |dirs| dirs.data_dir().join("status.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("relayguard");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from defaults, the TOML file and the environment.
///
/// `path` overrides the platform config path. A missing file is not an error.
/// Environment keys use `__` between section and field, e.g.
/// `RELAYGUARD_QUEUE__MIN_DELAY_MS=3000`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("RELAYGUARD_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Default config plus a commented example device, for `config init`.
pub fn render_template() -> Result<String, ConfigError> {
    let body = toml::to_string_pretty(&Config::default())?;
    Ok(format!(
        "# relayguard configuration\n\
         #\n\
         # Auth keys resolve from `auth_key_env`, then the system keyring\n\
         # (service \"{KEYRING_SERVICE}\", entry \"<id>/auth-key\"), then `auth_key`.\n\n\
         {body}\n\
         # [[devices]]\n\
         # id = \"front-door\"\n\
         # name = \"Front door\"\n\
         # server_url = \"https://shelly-42-eu.shelly.cloud\"\n\
         # device_id = \"e8db84aa1234\"\n\
         # auth_key_env = \"FRONT_DOOR_AUTH_KEY\"\n"
    ))
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("polling.base_interval_secs", self.polling.base_interval_secs)?;
        positive("vendor.status_timeout_secs", self.vendor.status_timeout_secs)?;
        positive("vendor.command_timeout_secs", self.vendor.command_timeout_secs)?;
        positive("monitor.interval_secs", self.monitor.interval_secs)?;
        positive("monitor.budget_secs", self.monitor.budget_secs)?;
        positive("staleness.threshold_secs", self.staleness.threshold_secs)?;

        if self.polling.max_delay_secs < self.polling.base_interval_secs {
            return Err(ConfigError::Validation {
                field: "polling.max_delay_secs".into(),
                reason: "must not be smaller than base_interval_secs".into(),
            });
        }
        if self.queue.max_depth == Some(0) {
            return Err(ConfigError::Validation {
                field: "queue.max_depth".into(),
                reason: "must be at least 1 (omit for unbounded)".into(),
            });
        }

        let mut seen = HashSet::new();
        for entry in &self.devices {
            if entry.id.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: "devices.id".into(),
                    reason: "must not be empty".into(),
                });
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::Validation {
                    field: "devices.id".into(),
                    reason: format!("duplicate device id '{}'", entry.id),
                });
            }
            if !entry.server_url.trim().is_empty() {
                url::Url::parse(entry.server_url.trim()).map_err(|e| ConfigError::Validation {
                    field: format!("devices.{}.server_url", entry.id),
                    reason: format!("invalid URL '{}': {e}", entry.server_url),
                })?;
            }
        }
        Ok(())
    }
}

fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a device's auth key: `auth_key_env` → keyring → plaintext.
pub fn resolve_auth_key(entry: &DeviceEntry) -> Option<SecretString> {
    resolve_auth_key_with(entry, |name| std::env::var(name).ok(), keyring_auth_key)
}

/// Credential chain with injectable env and keyring lookups.
pub fn resolve_auth_key_with(
    entry: &DeviceEntry,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    // 1. Env var named by the entry
    if let Some(value) = entry
        .auth_key_env
        .as_deref()
        .and_then(|name| env(name))
        .filter(|v| !v.trim().is_empty())
    {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(secret) = keyring(&entry.id).filter(|v| !v.trim().is_empty()) {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    entry
        .auth_key
        .clone()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn keyring_auth_key(device_id: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{device_id}/auth-key"))
        .ok()?
        .get_password()
        .ok()
}

/// Store a device's auth key in the system keyring.
pub fn store_auth_key(device_id: &str, key: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{device_id}/auth-key"))
        .and_then(|entry| entry.set_password(key))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation to runtime configs ──────────────────────────────────

impl DeviceEntry {
    /// Build a core `Device`. An unresolvable key yields an incomplete device.
    pub fn to_device(&self) -> Device {
        self.to_device_with(resolve_auth_key(self))
    }

    fn to_device_with(&self, auth_key: Option<SecretString>) -> Device {
        let mut device = Device::new(
            self.id.trim(),
            self.server_url.trim(),
            self.device_id.trim(),
            auth_key.unwrap_or_else(|| SecretString::from(String::new())),
        );
        device.name.clone_from(&self.name);
        device
    }
}

impl Config {
    pub fn devices(&self) -> Vec<Device> {
        self.devices.iter().map(DeviceEntry::to_device).collect()
    }

    /// Look a device up by id or display name.
    pub fn find_device(&self, identifier: &str) -> Option<&DeviceEntry> {
        self.devices
            .iter()
            .find(|d| d.id == identifier)
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(identifier)))
            })
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            min_delay: Duration::from_millis(self.queue.min_delay_ms),
            max_depth: self.queue.max_depth,
        }
    }

    pub fn polling_config(&self) -> PollingConfig {
        PollingConfig {
            base_interval: Duration::from_secs(self.polling.base_interval_secs),
            max_delay: Duration::from_secs(self.polling.max_delay_secs),
            success_jitter: Duration::from_millis(self.polling.success_jitter_ms),
            initial_jitter: Duration::from_millis(self.polling.initial_jitter_ms),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.monitor.interval_secs),
            inter_device_delay: Duration::from_millis(self.monitor.inter_device_delay_ms),
            rate_limit_retry: self
                .monitor
                .retry_on_429
                .then(|| Duration::from_millis(self.monitor.retry_delay_ms)),
            budget: Duration::from_secs(self.monitor.budget_secs),
        }
    }

    pub fn vendor_config(&self) -> VendorConfig {
        let mut transport = TransportConfig {
            status_timeout: Duration::from_secs(self.vendor.status_timeout_secs),
            command_timeout: Duration::from_secs(self.vendor.command_timeout_secs),
            ..TransportConfig::default()
        };
        if let Some(ref ua) = self.vendor.user_agent {
            transport.user_agent.clone_from(ua);
        }
        if let Some(ref ca) = self.vendor.ca_cert {
            transport.tls = TlsMode::CustomCa(ca.clone());
        }

        VendorConfig {
            transport,
            command_policy: if self.vendor.optimistic_commands {
                OptimisticCommandPolicy::Optimistic
            } else {
                OptimisticCommandPolicy::Strict
            },
            relay_channel: self.vendor.relay_channel,
        }
    }

    pub fn staleness(&self) -> StalenessEvaluator {
        StalenessEvaluator::new(Duration::from_secs(self.staleness.threshold_secs))
    }

    pub fn store_path(&self) -> PathBuf {
        self.monitor
            .store_path
            .clone()
            .unwrap_or_else(default_store_path)
    }

    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            queue: self.queue_config(),
            polling: self.polling_config(),
            monitor: self.monitor_config(),
            vendor: self.vendor_config(),
            stale_threshold: Some(Duration::from_secs(self.staleness.threshold_secs)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn entry() -> DeviceEntry {
        DeviceEntry {
            id: "front".into(),
            name: Some("Front door".into()),
            server_url: "https://cloud.example".into(),
            device_id: "abc".into(),
            auth_key: Some("plain".into()),
            auth_key_env: Some("FRONT_KEY".into()),
        }
    }

    #[test]
    fn env_var_wins_over_keyring_and_plaintext() {
        let key = resolve_auth_key_with(
            &entry(),
            |name| (name == "FRONT_KEY").then(|| "from-env".to_owned()),
            |_| Some("from-keyring".to_owned()),
        )
        .unwrap();
        assert_eq!(key.expose_secret(), "from-env");
    }

    #[test]
    fn keyring_wins_over_plaintext() {
        let key =
            resolve_auth_key_with(&entry(), |_| None, |id| Some(format!("{id}-keyring"))).unwrap();
        assert_eq!(key.expose_secret(), "front-keyring");
    }

    #[test]
    fn plaintext_is_last_resort() {
        let key = resolve_auth_key_with(&entry(), |_| None, |_| None).unwrap();
        assert_eq!(key.expose_secret(), "plain");
    }

    #[test]
    fn missing_key_yields_incomplete_device() {
        let mut e = entry();
        e.auth_key = None;
        let key = resolve_auth_key_with(&e, |_| None, |_| None);
        assert!(key.is_none());

        let device = e.to_device_with(key);
        assert!(!device.is_complete());
        assert_eq!(device.display_name(), "Front door");
    }

    #[test]
    fn defaults_translate_to_core_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.queue_config(), QueueConfig::default());
        assert_eq!(cfg.polling_config(), PollingConfig::default());
        assert_eq!(cfg.monitor_config(), MonitorConfig::default());
        assert_eq!(cfg.staleness(), StalenessEvaluator::default());
        assert_eq!(
            cfg.vendor_config().command_policy,
            OptimisticCommandPolicy::Optimistic
        );
    }

    #[test]
    fn disabling_429_retry_clears_retry_delay() {
        let mut cfg = Config::default();
        cfg.monitor.retry_on_429 = false;
        assert_eq!(cfg.monitor_config().rate_limit_retry, None);
    }

    #[test]
    fn duplicate_device_ids_are_rejected() {
        let cfg = Config {
            devices: vec![entry(), entry()],
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn find_device_by_name_is_case_insensitive() {
        let cfg = Config {
            devices: vec![entry()],
            ..Config::default()
        };
        assert_eq!(cfg.find_device("front door").unwrap().id, "front");
        assert!(cfg.find_device("back").is_none());
    }
}
