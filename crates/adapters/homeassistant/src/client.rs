//! REST client implementing the automation-platform and conversation ports.

use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use hassbridge_app::ports::{AutomationPlatform, ConversationAgent, ConversationReply, ConversationRequest};
use hassbridge_domain::context::ContextSnapshot;
use hassbridge_domain::entity::{EntityRecord, EntityState};
use hassbridge_domain::error::{BridgeError, Collaborator};
use hassbridge_domain::id::EntityId;
use hassbridge_domain::outcome::{ActionCall, ActionResponse};

use crate::config::HomeAssistantConfig;
use crate::error::HomeAssistantError;
use crate::wire::{
    AREA_TEMPLATE, AreaListing, ConversationPayload, ConversationResult, StateObject,
    TemplateRequest,
};

/// Home Assistant over its REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HomeAssistant {
    client: Client,
    base_url: String,
    agent_id: Option<String>,
    language: Option<String>,
}

impl std::fmt::Debug for HomeAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistant")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("agent_id", &self.agent_id)
            .finish()
    }
}

impl HomeAssistant {
    /// Build a client sending the bearer token on every request.
    ///
    /// # Errors
    ///
    /// Returns [`HomeAssistantError::InvalidToken`] when the token contains
    /// characters not allowed in a header, or [`HomeAssistantError::Client`]
    /// when the TLS backend cannot be initialised.
    pub fn new(config: &HomeAssistantConfig) -> Result<Self, HomeAssistantError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(HomeAssistantError::InvalidToken)?;
        bearer.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(HomeAssistantError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            agent_id: Some(config.agent_id.clone()).filter(|id| !id.trim().is_empty()),
            language: config.language.clone().filter(|lang| !lang.trim().is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, HomeAssistantError> {
        let status = response.status();
        let body = response.text().await.map_err(HomeAssistantError::Request)?;
        if !status.is_success() {
            return Err(HomeAssistantError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(HomeAssistantError::Decode)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HomeAssistantError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(HomeAssistantError::Request)?;
        Self::read_json(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HomeAssistantError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(HomeAssistantError::Request)?;
        Self::read_json(response).await
    }

    async fn states(&self) -> Result<Vec<StateObject>, HomeAssistantError> {
        let states: Vec<StateObject> = self.get("/api/states").await?;
        tracing::debug!(count = states.len(), "fetched entity states");
        Ok(states)
    }

    /// Area name per entity id. Best effort: any failure yields an empty map.
    async fn areas(&self) -> HashMap<String, String> {
        match self
            .post::<_, AreaListing>("/api/template", &TemplateRequest { template: AREA_TEMPLATE })
            .await
        {
            Ok(listing) => {
                let areas = listing.into_map();
                tracing::debug!(with_area = areas.len(), "fetched entity areas");
                areas
            }
            Err(HomeAssistantError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                tracing::warn!("template API not available, areas left empty");
                HashMap::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch entity areas");
                HashMap::new()
            }
        }
    }

    async fn fetch_entities(&self) -> Result<Vec<EntityRecord>, HomeAssistantError> {
        let states = self.states().await?;
        let areas = self.areas().await;
        let records = states
            .into_iter()
            .filter_map(|state| {
                let entity_id = state.entity_id.clone();
                let area = areas.get(&entity_id).map(String::as_str);
                match state.into_record(area) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        tracing::debug!(%entity_id, error = %err, "skipping entity");
                        None
                    }
                }
            })
            .collect();
        Ok(records)
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &EntityId,
        body: Value,
    ) -> Result<ActionResponse, HomeAssistantError> {
        tracing::info!(%entity_id, service = %format!("{domain}.{service}"), "calling service");
        let changed: Vec<StateObject> = self
            .post(&format!("/api/services/{domain}/{service}"), &body)
            .await?;
        let new_state = changed
            .into_iter()
            .find(|state| state.entity_id == entity_id.as_str())
            .map(|state| EntityState::from(state.state.as_str()));
        Ok(ActionResponse { new_state })
    }

    async fn process_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationReply, HomeAssistantError> {
        let payload = ConversationPayload {
            text: &request.text,
            agent_id: self.agent_id.as_deref(),
            language: self.language.as_deref(),
            conversation_id: request.session_id.as_deref(),
        };
        let result: ConversationResult = self.post("/api/conversation/process", &payload).await?;
        if result.conversation_id != request.session_id {
            tracing::debug!(
                conversation_id = result.conversation_id.as_deref().unwrap_or_default(),
                "conversation id changed"
            );
        }
        Ok(ConversationReply {
            text: result.speech(),
            session_id: result.conversation_id,
        })
    }
}

impl AutomationPlatform for HomeAssistant {
    fn list_entities(&self) -> impl Future<Output = Result<Vec<EntityRecord>, BridgeError>> + Send {
        async move { Ok(self.fetch_entities().await?) }
    }

    fn call_action(
        &self,
        call: ActionCall,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
        async move {
            let mut body = call.data;
            body.insert("entity_id".to_string(), json!(call.entity_id.as_str()));
            Ok(self
                .call_service(&call.domain, &call.service, &call.entity_id, Value::Object(body))
                .await?)
        }
    }

    fn run_script(
        &self,
        script_id: EntityId,
    ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
        async move {
            let body = json!({ "entity_id": script_id.as_str() });
            Ok(self.call_service("script", "turn_on", &script_id, body).await?)
        }
    }

    fn get_context_snapshot(
        &self,
    ) -> impl Future<Output = Result<ContextSnapshot, BridgeError>> + Send {
        async move {
            let states = self.states().await?;
            let records: Vec<EntityRecord> = states
                .into_iter()
                .filter_map(|state| state.into_record(None).ok())
                .collect();
            Ok(ContextSnapshot::from_records(&records).captured_at(Utc::now()))
        }
    }
}

impl ConversationAgent for HomeAssistant {
    fn converse(
        &self,
        request: ConversationRequest,
    ) -> impl Future<Output = Result<ConversationReply, BridgeError>> + Send {
        async move {
            tracing::info!(chars = request.text.chars().count(), "forwarding to conversation agent");
            self.process_conversation(&request)
                .await
                .map_err(|err| err.into_bridge(Collaborator::ConversationAgent))
        }
    }
}
