use chrono::Utc;
use registry::{status_url, DeviceRegistry, RegistryError};
use types::{DeviceIdentity, ParsedReading};

fn identity(name: &str, address: &str) -> DeviceIdentity {
    DeviceIdentity::new(name, name.replace('_', " "), address)
}

#[test]
fn registry_keeps_configured_order_and_derives_urls() {
    let registry = DeviceRegistry::new(vec![
        identity("garage_west_oben", "192.168.201.199"),
        identity("garage_west_unten", "192.168.201.76"),
        identity("garage_ost_oben", "192.168.201.124"),
    ])
    .expect("registry");

    let names: Vec<_> = registry.iter().map(|device| device.name()).collect();
    assert_eq!(
        names,
        ["garage_west_oben", "garage_west_unten", "garage_ost_oben"]
    );
    assert_eq!(
        registry.get("garage_west_unten").expect("device").url(),
        "http://192.168.201.76/home.cgi"
    );
    assert_eq!(registry.len(), 3);
}

#[test]
fn duplicate_names_are_rejected() {
    let result = DeviceRegistry::new(vec![
        identity("roof", "10.0.0.1"),
        identity("roof", "10.0.0.2"),
    ]);
    assert_eq!(
        result.unwrap_err(),
        RegistryError::DuplicateName("roof".to_string())
    );
}

#[test]
fn names_must_be_entity_slugs() {
    assert!(matches!(
        DeviceRegistry::new(vec![identity("Roof West", "10.0.0.1")]),
        Err(RegistryError::InvalidName(_))
    ));
    assert!(matches!(
        DeviceRegistry::new(vec![identity("", "10.0.0.1")]),
        Err(RegistryError::EmptyName)
    ));
    assert!(matches!(
        DeviceRegistry::new(vec![identity("roof", " ")]),
        Err(RegistryError::EmptyAddress(_))
    ));
}

#[test]
fn recording_a_reading_updates_last_values() {
    let mut registry = DeviceRegistry::new(vec![identity("roof", "10.0.0.1")]).expect("registry");
    let device = registry.iter_mut().next().expect("device");
    assert_eq!(device.generated_power_watts(), 0);

    device.record(&ParsedReading::new(4978, 14.52, Utc::now()));
    assert_eq!(device.generated_power_watts(), 4978);
    assert_eq!(device.daily_energy_kwh(), 14.52);

    device.record(&ParsedReading::zeroed(Utc::now()));
    assert_eq!(device.generated_power_watts(), 0);
    assert_eq!(device.daily_energy_kwh(), 0.0);
}

#[test]
fn status_url_trims_address() {
    assert_eq!(status_url(" 10.0.0.7 "), "http://10.0.0.7/home.cgi");
}
