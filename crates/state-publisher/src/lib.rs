mod home_assistant;
mod recording;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use types::{DeviceIdentity, ParsedReading};

pub use home_assistant::HomeAssistantSink;
pub use recording::RecordingSink;

/// `last_reset` is rendered at UTC+2, whatever the host clock says.
pub const LAST_RESET_OFFSET_SECS: i32 = 2 * 3600;

const LAST_UPDATED_FORMAT: &str = "%d/%m/%Y %H:%M";
const SENSOR_ICON: &str = "mdi:white-balance-sunny";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to build http client: {0}")]
    Build(reqwest::Error),
    #[error("state update transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("home assistant rejected the access token")]
    Unauthorized,
    #[error("home assistant returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("state sink unavailable: {0}")]
    Unavailable(String),
}

/// Attributes attached to each published sensor state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAttributes {
    pub unit_of_measurement: String,
    pub device_class: String,
    pub state_class: String,
    pub icon: String,
    pub friendly_name: String,
    pub last_reset: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}

/// One request to create or overwrite a host entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub entity_id: String,
    pub state: String,
    pub attributes: SensorAttributes,
}

/// Host capability that stores entity states.
#[async_trait]
pub trait StateSink: Send + Sync {
    async fn set_state(&self, update: &StateUpdate) -> Result<(), PublishError>;
}

#[derive(Debug, Clone)]
pub struct ReadingPublisher<S> {
    sink: S,
}

impl<S: StateSink> ReadingPublisher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Publishes the power sensor and then the energy sensor; the first failure is returned.
    pub async fn publish(
        &self,
        device: &DeviceIdentity,
        reading: &ParsedReading,
    ) -> Result<(), PublishError> {
        let [power, energy] = build_updates(device, reading);

        self.sink.set_state(&power).await?;
        self.sink.set_state(&energy).await?;

        info!(
            device = %device.name,
            last_updated = %power.attributes.last_updated,
            power_w = %power.state,
            energy_kwh = %energy.state,
            "sensor states updated"
        );
        Ok(())
    }
}

/// Builds the `<name>_generated_power` and `<name>_daily_energy` updates for one reading.
pub fn build_updates(device: &DeviceIdentity, reading: &ParsedReading) -> [StateUpdate; 2] {
    let last_reset = last_reset(reading.taken_at);
    let last_updated = last_updated(reading.taken_at);

    let power = StateUpdate {
        entity_id: power_entity_id(&device.name),
        state: format_state(f64::from(reading.generated_power_watts)),
        attributes: SensorAttributes {
            unit_of_measurement: "W".to_string(),
            device_class: "power".to_string(),
            state_class: "measurement".to_string(),
            icon: SENSOR_ICON.to_string(),
            friendly_name: format!("{} Generated Power", device.friendly_name),
            last_reset: last_reset.clone(),
            last_updated: last_updated.clone(),
        },
    };

    let energy = StateUpdate {
        entity_id: energy_entity_id(&device.name),
        state: format_state(reading.daily_energy_kwh),
        attributes: SensorAttributes {
            unit_of_measurement: "kWh".to_string(),
            device_class: "energy".to_string(),
            state_class: "total_increasing".to_string(),
            icon: SENSOR_ICON.to_string(),
            friendly_name: format!("{} Daily Generated Energy", device.friendly_name),
            last_reset,
            last_updated,
        },
    };

    [power, energy]
}

pub fn power_entity_id(device_name: &str) -> String {
    format!("sensor.{device_name}_generated_power")
}

pub fn energy_entity_id(device_name: &str) -> String {
    format!("sensor.{device_name}_daily_energy")
}

/// Fixed-point, two decimals.
pub fn format_state(value: f64) -> String {
    format!("{value:.2}")
}

pub fn last_reset_offset() -> FixedOffset {
    FixedOffset::east_opt(LAST_RESET_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Midnight of the reading's calendar day at the fixed reset offset.
pub fn last_reset(taken_at: DateTime<Utc>) -> String {
    let offset = last_reset_offset();
    let day = taken_at.with_timezone(&offset).date_naive();
    format!("{} 00:00:00{}", day.format("%Y-%m-%d"), offset)
}

/// Reading time in the host's local timezone.
pub fn last_updated(taken_at: DateTime<Utc>) -> String {
    taken_at
        .with_timezone(&Local)
        .format(LAST_UPDATED_FORMAT)
        .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn states_always_have_two_decimals() {
        assert_eq!(format_state(4978.0), "4978.00");
        assert_eq!(format_state(0.0), "0.00");
        assert_eq!(format_state(14.52), "14.52");
        assert_eq!(format_state(3.1), "3.10");
        assert_eq!(format_state(123_456.789), "123456.79");
    }

    #[test]
    fn last_reset_uses_fixed_offset_day() {
        // 23:30 UTC is already the next day at UTC+2.
        let late = Utc.with_ymd_and_hms(2019, 10, 5, 23, 30, 0).unwrap();
        assert_eq!(last_reset(late), "2019-10-06 00:00:00+02:00");

        let morning = Utc.with_ymd_and_hms(2019, 10, 5, 8, 58, 0).unwrap();
        assert_eq!(last_reset(morning), "2019-10-05 00:00:00+02:00");
    }

    #[test]
    fn last_updated_format() {
        let taken_at = Utc.with_ymd_and_hms(2021, 12, 1, 8, 58, 41).unwrap();
        let local = taken_at.with_timezone(&Local);
        assert_eq!(last_updated(taken_at), local.format("%d/%m/%Y %H:%M").to_string());
        // Unlike last_reset, the update time follows the host clock, not the fixed offset.
        assert_eq!(last_reset(taken_at), "2021-12-01 00:00:00+02:00");
    }

    #[test]
    fn attributes_serialize_with_host_names() {
        let device = DeviceIdentity::new("roof", "Roof", "10.0.0.1");
        let reading = ParsedReading::new(1, 0.5, Utc.with_ymd_and_hms(2021, 8, 9, 10, 0, 0).unwrap());
        let [power, _] = build_updates(&device, &reading);

        let value = serde_json::to_value(&power.attributes).expect("serialize");
        assert_eq!(value["lastUpdated"], last_updated(reading.taken_at));
        assert_eq!(value["unit_of_measurement"], "W");
        assert!(value.get("last_updated").is_none());
    }
}
