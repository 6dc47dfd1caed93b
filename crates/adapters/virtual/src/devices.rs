//! Virtual device implementations — light, switch, sensor, climate, script.
//!
//! Each device owns a fixed entity id, friendly name and area, and keeps its
//! mutable state behind a [`Mutex`](std::sync::Mutex).

mod climate;
mod light;
mod script;
mod sensor;
mod switch;

pub use climate::VirtualClimate;
pub use light::VirtualLight;
pub use script::VirtualScript;
pub use sensor::VirtualSensor;
pub use switch::VirtualSwitch;

use serde_json::{Map, Value};

use hassbridge_domain::entity::{EntityRecord, EntityRecordBuilder, EntityState};
use hassbridge_domain::error::BridgeError;
use hassbridge_domain::id::EntityId;

/// Identity shared by every virtual device.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub entity_id: EntityId,
    pub friendly_name: String,
    pub area: Option<String>,
}

impl Descriptor {
    /// # Errors
    ///
    /// Returns a validation error when `entity_id` is malformed.
    pub fn new(entity_id: &str, friendly_name: &str, area: Option<&str>) -> Result<Self, BridgeError> {
        Ok(Self {
            entity_id: EntityId::parse(entity_id)?,
            friendly_name: friendly_name.to_string(),
            area: area.map(str::to_string),
        })
    }

    fn builder(&self, state: EntityState) -> EntityRecordBuilder {
        let mut builder = EntityRecord::builder()
            .entity_id(self.entity_id.as_str())
            .friendly_name(self.friendly_name.as_str())
            .state(state)
            .observed_at(chrono::Utc::now());
        if let Some(area) = &self.area {
            builder = builder.area(area.as_str());
        }
        builder
    }
}

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Switch(VirtualSwitch),
    Sensor(VirtualSensor),
    Climate(VirtualClimate),
    Script(VirtualScript),
}

impl VirtualDevice {
    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.descriptor().entity_id
    }

    fn descriptor(&self) -> &Descriptor {
        match self {
            Self::Light(d) => &d.descriptor,
            Self::Switch(d) => &d.descriptor,
            Self::Sensor(d) => &d.descriptor,
            Self::Climate(d) => &d.descriptor,
            Self::Script(d) => &d.descriptor,
        }
    }

    /// Current state as a directory record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn record(&self) -> Result<EntityRecord, BridgeError> {
        match self {
            Self::Light(d) => d.record(),
            Self::Switch(d) => d.record(),
            Self::Sensor(d) => d.record(),
            Self::Climate(d) => d.record(),
            Self::Script(d) => d.record(),
        }
    }

    /// Apply a service call, returning the resulting state.
    pub fn handle_service(&self, service: &str, data: &Map<String, Value>) -> EntityState {
        match self {
            Self::Light(d) => d.handle_service(service, data),
            Self::Switch(d) => d.handle_service(service),
            Self::Sensor(d) => d.state(),
            Self::Climate(d) => d.handle_service(service, data),
            Self::Script(d) => d.handle_service(service),
        }
    }
}

fn on_off(on: bool) -> EntityState {
    if on { EntityState::On } else { EntityState::Off }
}
