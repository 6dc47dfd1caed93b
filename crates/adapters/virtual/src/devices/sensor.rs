//! Virtual sensor — a fixed reading with a unit and device class.

use hassbridge_domain::entity::{AttributeValue, EntityRecord, EntityState};
use hassbridge_domain::error::BridgeError;

use super::Descriptor;

/// A simulated read-only sensor.
pub struct VirtualSensor {
    pub(super) descriptor: Descriptor,
    value: f64,
    unit: &'static str,
    device_class: &'static str,
}

impl VirtualSensor {
    #[must_use]
    pub fn new(descriptor: Descriptor, value: f64, unit: &'static str, device_class: &'static str) -> Self {
        Self {
            descriptor,
            value,
            unit,
            device_class,
        }
    }

    #[must_use]
    pub fn state(&self) -> EntityState {
        EntityState::Value(self.value.to_string())
    }

    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn record(&self) -> Result<EntityRecord, BridgeError> {
        self.descriptor
            .builder(self.state())
            .attribute("unit_of_measurement", AttributeValue::String(self.unit.to_string()))
            .attribute("device_class", AttributeValue::String(self.device_class.to_string()))
            .build()
    }
}
