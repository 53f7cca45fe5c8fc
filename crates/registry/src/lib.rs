use std::collections::HashSet;

use thiserror::Error;
use tracing::info;

use types::{DeviceIdentity, ParsedReading};

/// Path of the status page served by the inverter's embedded web server.
pub const STATUS_PATH: &str = "/home.cgi";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("device name must not be empty")]
    EmptyName,
    #[error("device {0} has no address")]
    EmptyAddress(String),
    #[error("device name {0:?} may only contain lowercase letters, digits and underscores")]
    InvalidName(String),
    #[error("device name {0} is registered twice")]
    DuplicateName(String),
}

/// One monitored inverter together with its last published readings.
#[derive(Debug, Clone)]
pub struct Device {
    identity: DeviceIdentity,
    url: String,
    generated_power_watts: u32,
    daily_energy_kwh: f64,
}

impl Device {
    fn new(identity: DeviceIdentity) -> Self {
        let url = status_url(&identity.address);
        Self {
            identity,
            url,
            generated_power_watts: 0,
            daily_energy_kwh: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn friendly_name(&self) -> &str {
        &self.identity.friendly_name
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Status page URL, derived once from the address.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn generated_power_watts(&self) -> u32 {
        self.generated_power_watts
    }

    pub fn daily_energy_kwh(&self) -> f64 {
        self.daily_energy_kwh
    }

    pub fn record(&mut self, reading: &ParsedReading) {
        self.generated_power_watts = reading.generated_power_watts;
        self.daily_energy_kwh = reading.daily_energy_kwh;
    }
}

/// Fixed, ordered set of inverters built once at startup.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new(identities: impl IntoIterator<Item = DeviceIdentity>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        let mut devices = Vec::new();

        for identity in identities {
            validate_name(&identity.name)?;
            if identity.address.trim().is_empty() {
                return Err(RegistryError::EmptyAddress(identity.name));
            }
            if !seen.insert(identity.name.clone()) {
                return Err(RegistryError::DuplicateName(identity.name));
            }
            devices.push(Device::new(identity));
        }

        info!(count = devices.len(), "device registry built");
        Ok(Self { devices })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Mutable access for updating readings; membership and order stay fixed.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.name() == name)
    }
}

pub fn status_url(address: &str) -> String {
    format!("http://{}{}", address.trim(), STATUS_PATH)
}

/// Checks that a machine name can be embedded in an entity id.
pub fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() {
        return Err(RegistryError::EmptyName);
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}
