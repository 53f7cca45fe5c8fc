mod config;
pub mod systemd;

pub use config::{config_path_from_args, friendly_name_from, BridgeConfig, HomeAssistantConfig};
