//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.arcade/config.json`) and environment.
//! Every field has a default so an empty `{}` file (or no file) yields a runnable gateway.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Access point the gateway is reachable through.
    #[serde(default)]
    pub access_point: AccessPointConfig,

    /// Listener ports and run-loop settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Where the game-client bundle is served from.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Access point settings. The access point itself is brought up outside this process;
/// these values describe it to the gateway (address for DNS answers, SSID for logs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointConfig {
    #[serde(default = "default_ssid")]
    pub ssid: String,

    /// Empty means an open network.
    #[serde(default)]
    pub password: String,

    /// Hostname advertised to players (e.g. `play` for `http://play.local`).
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Maximum stations the access point admits.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// IPv4 address of the access point. Overridden by ARCADE_AP_ADDRESS env.
    #[serde(default = "default_ap_address")]
    pub address: Ipv4Addr,
}

/// Gateway listeners and cooperative loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Bind address for all three listeners (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_dns_port")]
    pub dns_port: u16,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// TTL in seconds on wildcard A answers.
    #[serde(default = "default_dns_ttl")]
    pub dns_ttl: u32,

    /// Number of WebSocket connection slots; upgrades beyond this are refused.
    #[serde(default = "default_max_clients")]
    pub max_clients: u8,

    /// Upper bound on DNS datagrams and relay events handled per tick.
    #[serde(default = "default_tick_budget")]
    pub tick_budget: usize,

    /// Seconds between client-count status lines in the log.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

/// Storage root for the static bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Directory served over HTTP. Relative paths resolve against the config file's parent.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

fn default_ssid() -> String {
    "LAN_Party_Arcade".to_string()
}

fn default_hostname() -> String {
    "play".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_ap_address() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 4, 1)
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_dns_port() -> u16 {
    53
}

fn default_http_port() -> u16 {
    80
}

fn default_ws_port() -> u16 {
    81
}

fn default_dns_ttl() -> u32 {
    60
}

fn default_max_clients() -> u8 {
    20
}

fn default_tick_budget() -> usize {
    32
}

fn default_status_interval_secs() -> u64 {
    5
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("www")
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: default_ssid(),
            password: String::new(),
            hostname: default_hostname(),
            max_connections: default_max_connections(),
            address: default_ap_address(),
        }
    }
}

impl AccessPointConfig {
    /// One-line description for the start-up log. The password is never shown.
    pub fn summary(&self) -> String {
        let password = if self.password.is_empty() { "(open)" } else { "***" };
        format!(
            "ssid {} | password {} | hostname {} | max connections {}",
            self.ssid, password, self.hostname, self.max_connections
        )
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            dns_port: default_dns_port(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            dns_ttl: default_dns_ttl(),
            max_clients: default_max_clients(),
            tick_budget: default_tick_budget(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

/// Resolve the access point address: env ARCADE_AP_ADDRESS overrides config.
/// An unparsable env value is ignored with a warning.
pub fn resolve_ap_address(config: &Config) -> Ipv4Addr {
    std::env::var("ARCADE_AP_ADDRESS")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                return None;
            }
            match t.parse::<Ipv4Addr>() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    log::warn!("ignoring invalid ARCADE_AP_ADDRESS: {}", t);
                    None
                }
            }
        })
        .unwrap_or(config.access_point.address)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ARCADE_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".arcade").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or ARCADE_CONFIG_PATH / default). Missing file => default config.
/// Returns the config and the path that was used (for resolving the storage root).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Resolve the storage root: absolute paths are used as-is, relative ones are joined to the config file's parent.
pub fn resolve_storage_root(config: &Config, config_path: &Path) -> PathBuf {
    let root = &config.storage.root;
    if root.is_absolute() {
        return root.clone();
    }
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join(root)
}

/// Apply a storage root given on the command line. Unlike the config file's `root`, a
/// relative path here is taken relative to `cwd`.
pub fn override_storage_root(config: &mut Config, root: PathBuf, cwd: &Path) {
    config.storage.root = if root.is_absolute() {
        root
    } else {
        cwd.join(root)
    };
}
