//! # hassbridge-adapter-virtual
//!
//! Virtual/demo automation platform that provides simulated entities for
//! testing and demonstration purposes, used when no Home Assistant instance
//! is configured.
//!
//! ## Provided entities
//!
//! | Entity ID | Name | Area | Behaviour |
//! |-----------|------|------|-----------|
//! | `light.living_room` | Living Room Light | Living Room | `turn_on` (with `brightness`) / `turn_off` / `toggle` |
//! | `light.bedroom` | Bedroom Light | Bedroom | same as above |
//! | `switch.coffee_maker` | Coffee Maker | Kitchen | `turn_on` / `turn_off` / `toggle` |
//! | `sensor.living_room_temperature` | Living Room Temperature | Living Room | fixed 21.5 °C |
//! | `sensor.living_room_humidity` | Living Room Humidity | Living Room | fixed 45 % |
//! | `climate.bedroom` | Bedroom AC | Bedroom | `set_hvac_mode` / `set_temperature` / `turn_on` / `turn_off` |
//! | `script.good_night` | Good Night | | counts runs |
//!
//! [`EchoAgent`] stands in for the conversation agent.
//!
//! ## Dependency rule
//!
//! Depends on `hassbridge-app` (port traits) and `hassbridge-domain` only.

mod agent;
mod devices;

use std::collections::BTreeMap;
use std::future::Future;

use hassbridge_app::ports::AutomationPlatform;
use hassbridge_domain::context::ContextSnapshot;
use hassbridge_domain::entity::EntityRecord;
use hassbridge_domain::error::{BridgeError, NotFoundError, ValidationError};
use hassbridge_domain::id::EntityId;
use hassbridge_domain::outcome::{ActionCall, ActionResponse};

pub use agent::EchoAgent;
use devices::{
    Descriptor, VirtualClimate, VirtualDevice, VirtualLight, VirtualScript, VirtualSensor,
    VirtualSwitch,
};

/// In-memory automation platform holding a small demo home.
pub struct VirtualPlatform {
    devices: BTreeMap<EntityId, VirtualDevice>,
}

impl VirtualPlatform {
    /// Build the demo home.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a built-in entity id is malformed.
    pub fn demo() -> Result<Self, BridgeError> {
        let devices = vec![
            VirtualDevice::Light(VirtualLight::new(Descriptor::new(
                "light.living_room",
                "Living Room Light",
                Some("Living Room"),
            )?)),
            VirtualDevice::Light(VirtualLight::new(Descriptor::new(
                "light.bedroom",
                "Bedroom Light",
                Some("Bedroom"),
            )?)),
            VirtualDevice::Switch(VirtualSwitch::new(Descriptor::new(
                "switch.coffee_maker",
                "Coffee Maker",
                Some("Kitchen"),
            )?)),
            VirtualDevice::Sensor(VirtualSensor::new(
                Descriptor::new(
                    "sensor.living_room_temperature",
                    "Living Room Temperature",
                    Some("Living Room"),
                )?,
                21.5,
                "\u{b0}C",
                "temperature",
            )),
            VirtualDevice::Sensor(VirtualSensor::new(
                Descriptor::new(
                    "sensor.living_room_humidity",
                    "Living Room Humidity",
                    Some("Living Room"),
                )?,
                45.0,
                "%",
                "humidity",
            )),
            VirtualDevice::Climate(VirtualClimate::new(
                Descriptor::new("climate.bedroom", "Bedroom AC", Some("Bedroom"))?,
                27.0,
            )),
            VirtualDevice::Script(VirtualScript::new(Descriptor::new(
                "script.good_night",
                "Good Night",
                None,
            )?)),
        ];

        Ok(Self {
            devices: devices
                .into_iter()
                .map(|device| (device.entity_id().clone(), device))
                .collect(),
        })
    }

    /// Check whether this platform owns the given entity.
    #[must_use]
    pub fn owns_entity(&self, entity_id: &EntityId) -> bool {
        self.devices.contains_key(entity_id)
    }

    fn device(&self, entity_id: &EntityId) -> Result<&VirtualDevice, BridgeError> {
        self.devices.get(entity_id).ok_or_else(|| {
            NotFoundError {
                token: entity_id.to_string(),
            }
            .into()
        })
    }

    fn records(&self) -> Result<Vec<EntityRecord>, BridgeError> {
        self.devices.values().map(VirtualDevice::record).collect()
    }
}

impl AutomationPlatform for VirtualPlatform {
    fn list_entities(&self) -> impl Future<Output = Result<Vec<EntityRecord>, BridgeError>> + Send {
        std::future::ready(self.records())
    }

    fn call_action(
        &self,
        call: ActionCall,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
        let result = self.device(&call.entity_id).map(|device| {
            tracing::debug!(entity_id = %call.entity_id, service = %call.qualified_service(), "virtual service call");
            ActionResponse::with_state(device.handle_service(&call.service, &call.data))
        });
        std::future::ready(result)
    }

    fn run_script(
        &self,
        script_id: EntityId,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
        let result = match self.device(&script_id) {
            Ok(VirtualDevice::Script(script)) => Ok(ActionResponse::with_state(
                script.handle_service("turn_on"),
            )),
            Ok(_) => Err(ValidationError::WrongDomain {
                entity_id: script_id.to_string(),
                expected: "script".to_string(),
            }
            .into()),
            Err(err) => Err(err),
        };
        std::future::ready(result)
    }

    fn get_context_snapshot(
        &self,
    ) -> impl Future<Output = Result<ContextSnapshot, BridgeError>> + Send {
        let result = self.records().map(|records| {
            ContextSnapshot::from_records(records.iter()).captured_at(chrono::Utc::now())
        });
        std::future::ready(result)
    }
}
