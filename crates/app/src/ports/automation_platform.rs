//! Automation platform port — entity listing and service calls.

use std::future::Future;
use std::sync::Arc;

use hassbridge_domain::context::ContextSnapshot;
use hassbridge_domain::entity::EntityRecord;
use hassbridge_domain::error::BridgeError;
use hassbridge_domain::id::EntityId;
use hassbridge_domain::outcome::{ActionCall, ActionResponse};

/// The home-automation control plane (Home Assistant, or the virtual platform).
pub trait AutomationPlatform: Send + Sync {
    /// Fetch every entity the platform knows about.
    ///
    /// Records carry the platform's friendly name, area and state; aliases
    /// are merged in by the directory cache.
    fn list_entities(&self) -> impl Future<Output = Result<Vec<EntityRecord>, BridgeError>> + Send;

    /// Invoke `domain.service` against one entity.
    fn call_action(
        &self,
        call: ActionCall,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send;

    /// Run a script entity.
    fn run_script(
        &self,
        script_id: EntityId,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send;

    /// Structured summary of the current home state.
    fn get_context_snapshot(
        &self,
    ) -> impl Future<Output = Result<ContextSnapshot, BridgeError>> + Send;
}

impl<T: AutomationPlatform> AutomationPlatform for Arc<T> {
    fn list_entities(&self) -> impl Future<Output = Result<Vec<EntityRecord>, BridgeError>> + Send {
        (**self).list_entities()
    }

    fn call_action(
        &self,
        call: ActionCall,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
        (**self).call_action(call)
    }

    fn run_script(
        &self,
        script_id: EntityId,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
        (**self).run_script(script_id)
    }

    fn get_context_snapshot(
        &self,
    ) -> impl Future<Output = Result<ContextSnapshot, BridgeError>> + Send {
        (**self).get_context_snapshot()
    }
}
