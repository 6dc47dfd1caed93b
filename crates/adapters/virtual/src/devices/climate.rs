//! Virtual climate unit — `set_hvac_mode`, `set_temperature`, `turn_on`, `turn_off`.

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use hassbridge_domain::entity::{AttributeValue, EntityRecord, EntityState};
use hassbridge_domain::error::BridgeError;

use super::Descriptor;

const OFF: &str = "off";
const DEFAULT_MODE: &str = "cool";

#[derive(Debug, Clone)]
struct ClimateState {
    hvac_mode: String,
    /// Mode restored by `turn_on`.
    last_active_mode: String,
    target_temperature: f64,
}

/// A simulated air conditioner.
pub struct VirtualClimate {
    pub(super) descriptor: Descriptor,
    current_temperature: f64,
    state: Mutex<ClimateState>,
}

impl VirtualClimate {
    #[must_use]
    pub fn new(descriptor: Descriptor, current_temperature: f64) -> Self {
        Self {
            descriptor,
            current_temperature,
            state: Mutex::new(ClimateState {
                hvac_mode: OFF.to_string(),
                last_active_mode: DEFAULT_MODE.to_string(),
                target_temperature: 24.0,
            }),
        }
    }

    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn record(&self) -> Result<EntityRecord, BridgeError> {
        let state = self.snapshot();
        self.descriptor
            .builder(EntityState::from(state.hvac_mode.as_str()))
            .attribute("hvac_mode", AttributeValue::String(state.hvac_mode))
            .attribute("current_temperature", AttributeValue::Float(self.current_temperature))
            .attribute("temperature", AttributeValue::Float(state.target_temperature))
            .build()
    }

    pub fn handle_service(&self, service: &str, data: &Map<String, Value>) -> EntityState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match service {
            "set_hvac_mode" => {
                if let Some(mode) = data.get("hvac_mode").and_then(Value::as_str) {
                    state.hvac_mode = mode.to_string();
                    if mode != OFF {
                        state.last_active_mode = mode.to_string();
                    }
                }
            }
            "set_temperature" => {
                if let Some(target) = data.get("temperature").and_then(Value::as_f64) {
                    state.target_temperature = target;
                }
            }
            "turn_off" => state.hvac_mode = OFF.to_string(),
            "turn_on" => state.hvac_mode = state.last_active_mode.clone(),
            other => tracing::debug!(entity_id = %self.descriptor.entity_id, service = other, "ignoring unsupported service"),
        }
        EntityState::from(state.hvac_mode.as_str())
    }

    fn snapshot(&self) -> ClimateState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
