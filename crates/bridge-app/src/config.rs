use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use poll_loop::PollSchedule;
use registry::DeviceRegistry;
use status_client::ClientConfig;
use types::DeviceIdentity;

const DEFAULT_HA_BASE_URL: &str = "http://localhost:8123";
const SUPERVISOR_BASE_URL: &str = "http://supervisor/core";

#[derive(Clone, Debug, Default)]
pub struct HomeAssistantConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    /// Log and keep updates in memory instead of sending them.
    pub dry_run: bool,
}

impl HomeAssistantConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_HA_BASE_URL)
    }
}

#[derive(Clone, Debug, Default)]
pub struct BridgeConfig {
    pub devices: Vec<DeviceIdentity>,
    pub schedule: PollSchedule,
    pub http: ClientConfig,
    pub home_assistant: HomeAssistantConfig,
}

impl BridgeConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config);
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schedule.period < Duration::from_secs(1) {
            anyhow::bail!("poller.period_secs must be >= 1");
        }
        if self.schedule.initial_delay >= self.schedule.period {
            anyhow::bail!(
                "poller.initial_delay_secs ({}) must be shorter than poller.period_secs ({})",
                self.schedule.initial_delay.as_secs(),
                self.schedule.period.as_secs()
            );
        }
        if let Some(timeout_ms) = self.http.timeout_ms {
            if timeout_ms == 0 {
                anyhow::bail!("http.timeout_ms must be >= 1 when set");
            }
        }
        DeviceRegistry::new(self.devices.clone()).context("invalid device list")?;

        let base_url = self.home_assistant.base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!("home_assistant.base_url must be an http(s) url, got {base_url}");
        }
        if !self.home_assistant.dry_run {
            match self.home_assistant.token.as_deref() {
                Some(token) if !token.trim().is_empty() => {}
                _ => anyhow::bail!("home_assistant.token is required unless dry_run is set"),
            }
        }

        Ok(())
    }
}

fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Ok(value) = env::var("ZEVER_DEVICES") {
        config.devices = parse_devices(&value);
    }

    if let Some(secs) = parse_env_u64("ZEVER_INITIAL_DELAY_SECS") {
        config.schedule.initial_delay = Duration::from_secs(secs);
    }

    if let Some(secs) = parse_env_u64("ZEVER_PERIOD_SECS") {
        config.schedule.period = Duration::from_secs(secs);
    }

    config.http.timeout_ms = parse_env_u64("ZEVER_HTTP_TIMEOUT_MS").or(config.http.timeout_ms);

    config.home_assistant.base_url = env::var("ZEVER_HA_URL")
        .ok()
        .or(config.home_assistant.base_url.take());
    config.home_assistant.token = env::var("ZEVER_HA_TOKEN")
        .ok()
        .or(config.home_assistant.token.take());
    config.home_assistant.dry_run =
        parse_env_bool("ZEVER_DRY_RUN").unwrap_or(config.home_assistant.dry_run);

    // Running as a Home Assistant add-on: talk to core through the supervisor proxy.
    if config.home_assistant.token.is_none() {
        if let Ok(token) = env::var("SUPERVISOR_TOKEN") {
            config.home_assistant.token = Some(token);
            if config.home_assistant.base_url.is_none() {
                config.home_assistant.base_url = Some(SUPERVISOR_BASE_URL.to_string());
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    devices: Option<Vec<FileDeviceConfig>>,
    poller: Option<FilePollerConfig>,
    http: Option<ClientConfig>,
    home_assistant: Option<FileHomeAssistantConfig>,
}

#[derive(Debug, Deserialize)]
struct FileDeviceConfig {
    name: String,
    friendly_name: Option<String>,
    address: String,
}

#[derive(Debug, Deserialize)]
struct FilePollerConfig {
    initial_delay_secs: Option<u64>,
    period_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileHomeAssistantConfig {
    base_url: Option<String>,
    token: Option<String>,
    dry_run: Option<bool>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("ZEVER_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut BridgeConfig, file: FileConfig) {
    if let Some(devices) = file.devices {
        config.devices = devices
            .into_iter()
            .map(|device| {
                let friendly_name = device
                    .friendly_name
                    .unwrap_or_else(|| friendly_name_from(&device.name));
                DeviceIdentity::new(device.name, friendly_name, device.address)
            })
            .collect();
    }

    if let Some(poller) = file.poller {
        if let Some(secs) = poller.initial_delay_secs {
            config.schedule.initial_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = poller.period_secs {
            config.schedule.period = Duration::from_secs(secs);
        }
    }

    if let Some(http) = file.http {
        config.http = http;
    }

    if let Some(home_assistant) = file.home_assistant {
        if let Some(base_url) = home_assistant.base_url {
            config.home_assistant.base_url = Some(base_url);
        }
        if let Some(token) = home_assistant.token {
            config.home_assistant.token = Some(token);
        }
        if let Some(dry_run) = home_assistant.dry_run {
            config.home_assistant.dry_run = dry_run;
        }
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Parses `name=address` or `name:Friendly Name=address` entries separated by commas.
fn parse_devices(value: &str) -> Vec<DeviceIdentity> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let device = parse_device(entry);
            if device.is_none() {
                warn!(entry, "ignoring malformed ZEVER_DEVICES entry, expected name=address");
            }
            device
        })
        .collect()
}

fn parse_device(entry: &str) -> Option<DeviceIdentity> {
    let (key, address) = entry.split_once('=')?;
    let (name, friendly_name) = match key.split_once(':') {
        Some((name, friendly)) => (name.trim(), friendly.trim().to_string()),
        None => (key.trim(), friendly_name_from(key.trim())),
    };
    let address = address.trim();
    if name.is_empty() || address.is_empty() {
        return None;
    }
    Some(DeviceIdentity::new(name, friendly_name, address))
}

/// Picks the config file from `--config <path>` or `--config=<path>`.
pub fn config_path_from_args(args: impl IntoIterator<Item = String>) -> Option<String> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
        if arg == "--config" {
            return args.next();
        }
    }
    None
}

/// `garage_west_oben` becomes `Garage West Oben`.
pub fn friendly_name_from(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
