use std::env;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use bridge_app::BridgeConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_KEYS: &[&str] = &[
    "ZEVER_CONFIG",
    "ZEVER_DEVICES",
    "ZEVER_INITIAL_DELAY_SECS",
    "ZEVER_PERIOD_SECS",
    "ZEVER_HTTP_TIMEOUT_MS",
    "ZEVER_HA_URL",
    "ZEVER_HA_TOKEN",
    "ZEVER_DRY_RUN",
    "SUPERVISOR_TOKEN",
];

fn clear_env() {
    for key in ENV_KEYS {
        env::remove_var(key);
    }
}

#[test]
fn toml_config_validates() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("ZEVER_CONFIG", fixture_path("config-valid.toml"));

    let config = BridgeConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.devices.len(), 3);
    assert_eq!(config.devices[1].name, "garage_west_unten");
    assert_eq!(config.devices[1].friendly_name, "Garage West Unten");
    assert_eq!(config.devices[2].address, "192.168.201.124");
    assert_eq!(config.schedule.period, Duration::from_secs(60));
    assert_eq!(config.http.timeout_ms, Some(5_000));
    assert_eq!(
        config.home_assistant.base_url(),
        "http://homeassistant.local:8123"
    );
    assert!(!config.home_assistant.dry_run);

    clear_env();
}

#[test]
fn json_config_validates() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();

    let config = BridgeConfig::load_with_path(Some(fixture_path("config-valid.json")))
        .expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.devices[0].friendly_name, "Roof South");
    assert_eq!(config.schedule.initial_delay, Duration::from_secs(5));
    assert_eq!(config.schedule.period, Duration::from_secs(30));
    assert_eq!(config.http.timeout_ms, None);
    assert!(config.home_assistant.dry_run);

    clear_env();
}

#[test]
fn invalid_config_fails_validation() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("ZEVER_CONFIG", fixture_path("config-invalid.toml"));

    let config = BridgeConfig::load().expect("load config");
    assert!(config.validate().is_err());

    env::set_var("ZEVER_PERIOD_SECS", "60");
    let config = BridgeConfig::load().expect("load config");
    let err = config.validate().unwrap_err();
    assert!(format!("{err:#}").contains("registered twice"));

    clear_env();
}

#[test]
fn env_overrides_file_values() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("ZEVER_CONFIG", fixture_path("config-valid.toml"));
    env::set_var("ZEVER_DEVICES", "carport=10.1.1.1");
    env::set_var("ZEVER_PERIOD_SECS", "120");
    env::set_var("ZEVER_HA_TOKEN", "from-env");

    let config = BridgeConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices[0].friendly_name, "Carport");
    assert_eq!(config.schedule.period, Duration::from_secs(120));
    assert_eq!(config.home_assistant.token.as_deref(), Some("from-env"));

    clear_env();
}

#[test]
fn supervisor_token_switches_to_supervisor_proxy() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("ZEVER_DEVICES", "roof=10.0.0.5");
    env::set_var("SUPERVISOR_TOKEN", "supervisor-token");

    let config = BridgeConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.home_assistant.base_url(), "http://supervisor/core");
    assert_eq!(
        config.home_assistant.token.as_deref(),
        Some("supervisor-token")
    );

    clear_env();
}

#[test]
fn missing_token_fails_unless_dry_run() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("ZEVER_DEVICES", "roof=10.0.0.5");

    let config = BridgeConfig::load().expect("load config");
    assert!(config.validate().is_err());

    env::set_var("ZEVER_DRY_RUN", "true");
    let config = BridgeConfig::load().expect("load config");
    config.validate().expect("dry run needs no token");

    clear_env();
}

#[test]
fn initial_delay_not_shorter_than_period_fails_validation() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("ZEVER_DEVICES", "roof=10.0.0.5");
    env::set_var("ZEVER_DRY_RUN", "true");
    env::set_var("ZEVER_INITIAL_DELAY_SECS", "60");

    let config = BridgeConfig::load().expect("load config");
    let err = config.validate().expect_err("delay equal to period");
    assert!(err.to_string().contains("initial_delay_secs"));

    env::set_var("ZEVER_PERIOD_SECS", "61");
    let config = BridgeConfig::load().expect("load config");
    config.validate().expect("delay shorter than period");

    clear_env();
}

fn fixture_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path.to_string_lossy().to_string()
}
