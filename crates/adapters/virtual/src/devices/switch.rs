//! Virtual switch — responds to `turn_on`, `turn_off`, `toggle`.

use std::sync::{Mutex, PoisonError};

use hassbridge_domain::entity::{EntityRecord, EntityState};
use hassbridge_domain::error::BridgeError;

use super::{Descriptor, on_off};

/// A simulated on/off switch.
pub struct VirtualSwitch {
    pub(super) descriptor: Descriptor,
    on: Mutex<bool>,
}

impl VirtualSwitch {
    #[must_use]
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            on: Mutex::new(false),
        }
    }

    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn record(&self) -> Result<EntityRecord, BridgeError> {
        let on = *self.on.lock().unwrap_or_else(PoisonError::into_inner);
        self.descriptor.builder(on_off(on)).build()
    }

    pub fn handle_service(&self, service: &str) -> EntityState {
        let mut on = self.on.lock().unwrap_or_else(PoisonError::into_inner);
        match service {
            "turn_on" => *on = true,
            "turn_off" => *on = false,
            "toggle" => *on = !*on,
            _ => {}
        }
        on_off(*on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch() -> VirtualSwitch {
        VirtualSwitch::new(Descriptor::new("switch.fan", "Fan", None).unwrap())
    }

    #[test]
    fn should_default_to_off() {
        assert_eq!(switch().record().unwrap().state.state, EntityState::Off);
    }

    #[test]
    fn should_turn_on_then_off() {
        let switch = switch();
        assert_eq!(switch.handle_service("turn_on"), EntityState::On);
        assert_eq!(switch.handle_service("turn_off"), EntityState::Off);
        assert_eq!(switch.record().unwrap().state.state, EntityState::Off);
    }
}
