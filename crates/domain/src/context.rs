//! Home context summary used by the `info` verb.
//!
//! The snapshot is derived from a flat list of entity records: lights that
//! are on, climate units, environment sensors, weather and binary sensors
//! worth attention. Zero readings are treated as missing, which is how many
//! integrations report a sensor that has not produced a value yet.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityRecord, EntityState, Timestamp};

const ALERT_DEVICE_CLASSES: [&str; 7] = [
    "door",
    "window",
    "motion",
    "occupancy",
    "smoke",
    "gas",
    "moisture",
];

const AIR_QUALITY_CLASSES: [&str; 7] = ["aqi", "pm25", "pm10", "co2", "co", "no2", "o3"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightSummary {
    pub name: String,
    /// Brightness in percent.
    pub brightness: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateSummary {
    pub name: String,
    pub hvac_mode: String,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub fan_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub name: String,
    pub value: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub name: String,
    pub condition: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinarySensorAlert {
    pub name: String,
    pub device_class: String,
}

/// Structured state of the home at one point in time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub lights_on: Vec<LightSummary>,
    pub climate: Vec<ClimateSummary>,
    pub temperatures: Vec<SensorReading>,
    pub humidity: Vec<SensorReading>,
    pub air_quality: Vec<SensorReading>,
    pub weather: Vec<WeatherSummary>,
    pub alerts: Vec<BinarySensorAlert>,
    pub captured_at: Option<Timestamp>,
}

impl ContextSnapshot {
    /// Categorise records into a snapshot. Records are taken in id order.
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a EntityRecord>) -> Self {
        let mut records: Vec<_> = records.into_iter().collect();
        records.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let mut snapshot = Self::default();
        for record in records {
            snapshot.absorb(record);
        }
        snapshot
    }

    #[must_use]
    pub fn captured_at(mut self, ts: Timestamp) -> Self {
        self.captured_at = Some(ts);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights_on.is_empty()
            && self.climate.is_empty()
            && self.temperatures.is_empty()
            && self.humidity.is_empty()
            && self.air_quality.is_empty()
            && self.weather.is_empty()
            && self.alerts.is_empty()
    }

    fn absorb(&mut self, record: &EntityRecord) {
        let name = record.friendly_name.clone();
        let state = &record.state.state;
        let attr_f64 = |key: &str| {
            record
                .state
                .attribute(key)
                .and_then(crate::entity::AttributeValue::as_f64)
                .filter(|value| *value != 0.0)
        };
        let attr_str = |key: &str| {
            record
                .state
                .attribute(key)
                .and_then(crate::entity::AttributeValue::as_str)
                .map(str::to_string)
        };
        let id = record.entity_id.as_str();

        match record.entity_id.domain() {
            "light" if *state == EntityState::On => {
                let brightness = record
                    .state
                    .attribute("brightness")
                    .and_then(crate::entity::AttributeValue::as_f64)
                    .map(brightness_percent);
                self.lights_on.push(LightSummary { name, brightness });
            }
            "climate" => self.climate.push(ClimateSummary {
                name,
                hvac_mode: attr_str("hvac_mode").unwrap_or_else(|| state.to_string()),
                current_temperature: attr_f64("current_temperature"),
                target_temperature: attr_f64("temperature"),
                fan_mode: attr_str("fan_mode"),
            }),
            "sensor" => {
                let device_class = attr_str("device_class").unwrap_or_default();
                let unit = attr_str("unit_of_measurement");
                let Some(value) = state.as_f64() else {
                    if AIR_QUALITY_CLASSES.contains(&device_class.as_str()) {
                        self.air_quality.push(reading(name, state, unit));
                    }
                    return;
                };
                if device_class == "temperature" || id.contains("temperature") {
                    if value != 0.0 {
                        self.temperatures
                            .push(reading(name, state, unit.or(Some("°C".to_string()))));
                    }
                } else if device_class == "humidity" || id.contains("humidity") {
                    if value > 0.0 {
                        self.humidity
                            .push(reading(name, state, unit.or(Some("%".to_string()))));
                    }
                } else if AIR_QUALITY_CLASSES.contains(&device_class.as_str())
                    || id.contains("air_quality")
                    || id.contains("aqi")
                {
                    self.air_quality.push(reading(name, state, unit));
                }
            }
            "weather" => self.weather.push(WeatherSummary {
                name,
                condition: attr_str("condition").unwrap_or_else(|| state.to_string()),
                temperature: attr_f64("temperature"),
                humidity: attr_f64("humidity"),
            }),
            "binary_sensor" if *state == EntityState::On => {
                let device_class = attr_str("device_class").unwrap_or_default();
                if ALERT_DEVICE_CLASSES.contains(&device_class.as_str()) {
                    self.alerts.push(BinarySensorAlert { name, device_class });
                }
            }
            _ => {}
        }
    }
}

fn reading(name: String, state: &EntityState, unit: Option<String>) -> SensorReading {
    SensorReading {
        name,
        value: state.to_string(),
        unit: unit.unwrap_or_default(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn brightness_percent(raw: f64) -> u8 {
    ((raw / 255.0) * 100.0).round().clamp(0.0, 100.0) as u8
}
