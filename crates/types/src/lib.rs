use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Basic identity for an inverter endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Machine name, used in published entity ids.
    pub name: String,
    pub friendly_name: String,
    /// Host name or IP address of the inverter's web interface.
    pub address: String,
}

impl DeviceIdentity {
    pub fn new(
        name: impl Into<String>,
        friendly_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            friendly_name: friendly_name.into(),
            address: address.into(),
        }
    }
}

/// The two values read from one inverter in one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedReading {
    pub generated_power_watts: u32,
    pub daily_energy_kwh: f64,
    /// When the inverter was called, captured before the request went out.
    pub taken_at: DateTime<Utc>,
}

impl ParsedReading {
    pub fn new(generated_power_watts: u32, daily_energy_kwh: f64, taken_at: DateTime<Utc>) -> Self {
        Self {
            generated_power_watts,
            daily_energy_kwh,
            taken_at,
        }
    }

    /// Reading published when the inverter could not be read.
    pub fn zeroed(taken_at: DateTime<Utc>) -> Self {
        Self::new(0, 0.0, taken_at)
    }
}
