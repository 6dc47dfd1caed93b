//! Virtual light — responds to `turn_on`, `turn_off`, `toggle`.

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use hassbridge_domain::entity::{AttributeValue, EntityRecord, EntityState};
use hassbridge_domain::error::BridgeError;

use super::{Descriptor, on_off};

const FULL_BRIGHTNESS: u8 = 255;

#[derive(Debug, Clone, Copy)]
struct LightState {
    on: bool,
    brightness: u8,
}

/// A simulated dimmable light.
pub struct VirtualLight {
    pub(super) descriptor: Descriptor,
    state: Mutex<LightState>,
}

impl VirtualLight {
    #[must_use]
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            state: Mutex::new(LightState {
                on: false,
                brightness: FULL_BRIGHTNESS,
            }),
        }
    }

    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn record(&self) -> Result<EntityRecord, BridgeError> {
        let state = self.snapshot();
        let mut builder = self.descriptor.builder(on_off(state.on));
        if state.on {
            builder = builder.attribute("brightness", AttributeValue::Int(i64::from(state.brightness)));
        }
        builder.build()
    }

    pub fn handle_service(&self, service: &str, data: &Map<String, Value>) -> EntityState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match service {
            "turn_on" => {
                state.on = true;
                if let Some(brightness) = data
                    .get("brightness")
                    .and_then(Value::as_u64)
                    .and_then(|b| u8::try_from(b).ok())
                {
                    state.brightness = brightness;
                }
            }
            "turn_off" => state.on = false,
            "toggle" => state.on = !state.on,
            other => tracing::debug!(entity_id = %self.descriptor.entity_id, service = other, "ignoring unsupported service"),
        }
        on_off(state.on)
    }

    fn snapshot(&self) -> LightState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
