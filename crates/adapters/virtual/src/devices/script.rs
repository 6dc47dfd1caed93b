//! Virtual script — counts how many times it was run.

use std::sync::atomic::{AtomicU64, Ordering};

use hassbridge_domain::entity::{AttributeValue, EntityRecord, EntityState};
use hassbridge_domain::error::BridgeError;

use super::Descriptor;

/// A simulated script; runs complete instantly.
pub struct VirtualScript {
    pub(super) descriptor: Descriptor,
    runs: AtomicU64,
}

impl VirtualScript {
    #[must_use]
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            runs: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn record(&self) -> Result<EntityRecord, BridgeError> {
        let runs = i64::try_from(self.runs()).unwrap_or(i64::MAX);
        self.descriptor
            .builder(EntityState::Off)
            .attribute("run_count", AttributeValue::Int(runs))
            .build()
    }

    pub fn handle_service(&self, service: &str) -> EntityState {
        if matches!(service, "turn_on" | "run") {
            self.runs.fetch_add(1, Ordering::Relaxed);
            tracing::info!(entity_id = %self.descriptor.entity_id, "virtual script run");
        }
        EntityState::Off
    }
}
