//! Command executor — turns a verb and its resolved targets into platform calls.
//!
//! Targets are processed one after another in input order. A failing target
//! never stops the ones after it; every target yields exactly one
//! [`CommandResult`].

use std::time::Duration;

use hassbridge_domain::climate::{ClimateSettings, HvacMode};
use hassbridge_domain::command::Verb;
use hassbridge_domain::entity::EntityDomain;
use hassbridge_domain::error::{Collaborator, ValidationError};
use hassbridge_domain::id::{DOMAIN_SEPARATOR, EntityId};
use hassbridge_domain::outcome::{ActionCall, ActionResponse, CommandResult, TargetFailure};
use hassbridge_domain::resolution::{Resolution, ResolvedTarget};

use crate::deadline::{DEFAULT_CALL_TIMEOUT, bounded};
use crate::ports::AutomationPlatform;

const SCRIPT_DOMAIN: &str = "script";
const CLIMATE_DOMAIN: &str = "climate";

/// Normalise a script token: a bare name becomes `script.<name>`.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedEntityId`] when the result is not a
/// valid entity id, and [`ValidationError::WrongDomain`] for a dotted id
/// outside the script domain.
pub fn normalize_script_id(token: &str) -> Result<EntityId, ValidationError> {
    let token = token.trim();
    let id = if token.contains(DOMAIN_SEPARATOR) {
        EntityId::parse(token)?
    } else {
        EntityId::from_parts(SCRIPT_DOMAIN, token)?
    };
    ensure_domain(&id, SCRIPT_DOMAIN)?;
    Ok(id)
}

fn ensure_domain(id: &EntityId, expected: &str) -> Result<(), ValidationError> {
    if id.domain() == expected {
        Ok(())
    } else {
        Err(ValidationError::WrongDomain {
            entity_id: id.to_string(),
            expected: expected.to_string(),
        })
    }
}

/// Executes mutating verbs against the automation platform.
pub struct CommandExecutor<P> {
    platform: P,
    call_timeout: Duration,
}

impl<P: AutomationPlatform> CommandExecutor<P> {
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Execute `verb` for every target, returning one result per target in order.
    ///
    /// `extra_args` carries the non-target arguments (climate settings).
    /// Verbs that are not executable here produce a validation failure per
    /// target.
    pub async fn execute(
        &self,
        verb: Verb,
        targets: Vec<Resolution>,
        extra_args: &[String],
    ) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(targets.len());
        for resolution in targets {
            let result = match resolution {
                Ok(target) => self.execute_target(verb, target, extra_args).await,
                Err(err) => {
                    let token = err.token().to_string();
                    tracing::debug!(%verb, %token, error = %err, "target not resolved");
                    CommandResult {
                        token,
                        entity_id: None,
                        outcome: Err(err.into()),
                        warning: None,
                    }
                }
            };
            results.push(result);
        }
        results
    }

    async fn execute_target(
        &self,
        verb: Verb,
        target: ResolvedTarget,
        extra_args: &[String],
    ) -> CommandResult {
        let warning = target.ambiguity();
        let outcome = match verb {
            Verb::TurnOn | Verb::TurnOff | Verb::Toggle => self.switch(verb, &target.entity_id).await,
            Verb::Script => self.script(&target.entity_id).await,
            Verb::Climate => self.climate(&target.entity_id, extra_args).await,
            other => Err(TargetFailure::Validation(ValidationError::UnexpectedArgument {
                verb: other.to_string(),
                argument: target.token.clone(),
            })),
        };

        match &outcome {
            Ok(_) => tracing::info!(%verb, entity_id = %target.entity_id, "target executed"),
            Err(failure) => tracing::warn!(
                %verb,
                entity_id = %target.entity_id,
                error = %failure,
                "target failed"
            ),
        }

        CommandResult {
            token: target.token,
            entity_id: Some(target.entity_id),
            outcome,
            warning,
        }
    }

    async fn switch(&self, verb: Verb, id: &EntityId) -> Result<ActionResponse, TargetFailure> {
        let service = verb.switch_service().ok_or_else(|| {
            TargetFailure::Validation(ValidationError::UnexpectedArgument {
                verb: verb.to_string(),
                argument: id.to_string(),
            })
        })?;
        self.call(ActionCall::for_entity(service, id.clone())).await
    }

    async fn script(&self, id: &EntityId) -> Result<ActionResponse, TargetFailure> {
        ensure_domain(id, SCRIPT_DOMAIN)?;
        bounded(
            Collaborator::AutomationPlatform,
            self.call_timeout,
            self.platform.run_script(id.clone()),
        )
        .await
        .map_err(TargetFailure::from)
    }

    /// Mode first, then temperature. `off` maps to `climate.turn_off`.
    async fn climate(
        &self,
        id: &EntityId,
        settings: &[String],
    ) -> Result<ActionResponse, TargetFailure> {
        if EntityDomain::from(id) != EntityDomain::Climate {
            return Err(ValidationError::WrongDomain {
                entity_id: id.to_string(),
                expected: CLIMATE_DOMAIN.to_string(),
            }
            .into());
        }
        let settings = ClimateSettings::parse(settings)?;

        let mut response = ActionResponse::default();
        if let Some(mode) = settings.mode {
            let call = match mode {
                HvacMode::Off => ActionCall::new(CLIMATE_DOMAIN, "turn_off", id.clone()),
                other => ActionCall::new(CLIMATE_DOMAIN, "set_hvac_mode", id.clone())
                    .with_data("hvac_mode", other.as_platform_str()),
            };
            response = self.call(call).await?;
        }
        if let Some(temperature) = settings.temperature {
            let call = ActionCall::new(CLIMATE_DOMAIN, "set_temperature", id.clone())
                .with_data("temperature", temperature);
            let after = self.call(call).await?;
            if after.new_state.is_some() {
                response = after;
            }
        }
        Ok(response)
    }

    async fn call(&self, call: ActionCall) -> Result<ActionResponse, TargetFailure> {
        tracing::debug!(service = %call.qualified_service(), entity_id = %call.entity_id, "calling service");
        bounded(
            Collaborator::AutomationPlatform,
            self.call_timeout,
            self.platform.call_action(call),
        )
        .await
        .map_err(TargetFailure::from)
    }
}
