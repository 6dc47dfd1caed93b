//! Dispatch router — drives one inbound message to a terminal state.
//!
//! ```text
//! Received ─┬─ voice ─▶ Transcribing ─┬─▶ TextReady
//!           │                         └─▶ Skipped (no text, no reply)
//!           └─ text ──────────────────────▶ TextReady
//! TextReady ─▶ Classify ─┬─ command ─▶ Tokenize ─▶ Authorize ─▶ Resolve ─▶ Execute ─▶ Replied | Failed
//!                        └─ natural language ─▶ Converse ─▶ Replied | Failed
//! ```
//!
//! The router only reads shared state: each dispatch takes one directory
//! generation up front and uses it throughout. Conversational state lives
//! in the caller-owned [`ConversationSession`] of the group.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hassbridge_domain::command::{ParsedCommand, Tokenizer, Verb};
use hassbridge_domain::entity::EntityDomain;
use hassbridge_domain::error::{
    BridgeError, Collaborator, ParseError, PermissionDenied, TransportErrorKind, ValidationError,
};
use hassbridge_domain::id::{GroupId, SenderId};
use hassbridge_domain::message::{InboundMessage, MessagePayload, OutboundReply, VoiceClip};
use hassbridge_domain::outcome::{CommandResult, TargetFailure};
use hassbridge_domain::resolution::{Resolution, ResolvedTarget};

use crate::deadline::{DEFAULT_CALL_TIMEOUT, bounded};
use crate::ports::{
    AutomationPlatform, ConversationAgent, ConversationRequest, ReplySink, Transcriber,
    TranscriptionRequest,
};
use crate::reply;
use crate::services::executor::normalize_script_id;
use crate::services::{AmbiguityPolicy, CommandExecutor, DirectoryCache, PermissionGate, Resolver};

/// Conversational state of one group, owned by that group's sequencer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationSession {
    id: Option<String>,
}

impl ConversationSession {
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Continue the agent-side session `id` on the next turn.
    pub fn resume(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn reset(&mut self) {
        self.id = None;
    }
}

/// Why a message produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    GroupNotAllowed,
    EmptyMessage,
    /// Voice arrived but no transcriber is configured.
    VoiceUnsupported,
    TranscriptionEmpty,
    TranscriptionFailed,
}

/// Why a dispatch failed. Every failure except an undeliverable reply is
/// reported to the group with one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    Parse(ParseError),
    PermissionDenied(PermissionDenied),
    Validation { verb: Verb, error: ValidationError },
    Transport {
        collaborator: Collaborator,
        kind: TransportErrorKind,
    },
    ReplyUndeliverable,
}

/// Terminal state of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Replied(OutboundReply),
    Skipped(SkipReason),
    Failed {
        reason: FailureReason,
        reply: Option<OutboundReply>,
    },
}

impl DispatchOutcome {
    /// The reply that was sent, if any.
    #[must_use]
    pub fn reply(&self) -> Option<&OutboundReply> {
        match self {
            Self::Replied(reply) => Some(reply),
            Self::Failed { reply, .. } => reply.as_ref(),
            Self::Skipped(_) => None,
        }
    }

    #[must_use]
    pub fn is_replied(&self) -> bool {
        matches!(self, Self::Replied(_))
    }
}

/// Anything that can dispatch a message for a group.
///
/// Implemented by [`DispatchRouter`]; the sequencer only depends on this.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(
        &self,
        message: InboundMessage,
        session: &mut ConversationSession,
    ) -> impl Future<Output = DispatchOutcome> + Send;
}

impl<T: Dispatch> Dispatch for Arc<T> {
    fn dispatch(
        &self,
        message: InboundMessage,
        session: &mut ConversationSession,
    ) -> impl Future<Output = DispatchOutcome> + Send {
        (**self).dispatch(message, session)
    }
}

/// Vendor parameters passed with every transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    pub engine: String,
    pub region: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            engine: "16k_zh".to_string(),
            region: String::new(),
        }
    }
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub marker: String,
    pub allowed_senders: Vec<SenderId>,
    pub allowed_groups: Vec<GroupId>,
    pub ambiguity: AmbiguityPolicy,
    pub call_timeout: Duration,
    pub voice: VoiceSettings,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            marker: hassbridge_domain::command::DEFAULT_MARKER.to_string(),
            allowed_senders: Vec::new(),
            allowed_groups: Vec::new(),
            ambiguity: AmbiguityPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            voice: VoiceSettings::default(),
        }
    }
}

/// Intermediate result before the reply is sent.
enum Step {
    Reply(String),
    Skip(SkipReason),
    Fail(FailureReason),
}

impl Step {
    fn transport(err: &BridgeError, fallback: Collaborator) -> Self {
        match err {
            BridgeError::Transport(inner) => Self::Fail(FailureReason::Transport {
                collaborator: inner.collaborator,
                kind: inner.kind,
            }),
            _ => Self::Fail(FailureReason::Transport {
                collaborator: fallback,
                kind: TransportErrorKind::InvalidResponse,
            }),
        }
    }

    fn validation(verb: Verb, error: ValidationError) -> Self {
        Self::Fail(FailureReason::Validation { verb, error })
    }
}

/// The top-level entry point for inbound messages.
pub struct DispatchRouter<P, C, T, S> {
    tokenizer: Tokenizer,
    gate: PermissionGate,
    resolver: Resolver,
    cache: Arc<DirectoryCache<P>>,
    executor: CommandExecutor<P>,
    platform: P,
    agent: C,
    transcriber: Option<T>,
    sink: S,
    call_timeout: Duration,
    voice: VoiceSettings,
}

impl<P, C, T, S> DispatchRouter<P, C, T, S>
where
    P: AutomationPlatform + Clone,
    C: ConversationAgent,
    T: Transcriber,
    S: ReplySink,
{
    pub fn new(
        cache: Arc<DirectoryCache<P>>,
        platform: P,
        agent: C,
        transcriber: Option<T>,
        sink: S,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            tokenizer: Tokenizer::new(settings.marker),
            gate: PermissionGate::new(settings.allowed_senders, settings.allowed_groups),
            resolver: Resolver::new(settings.ambiguity),
            cache,
            executor: CommandExecutor::new(platform.clone()).with_call_timeout(settings.call_timeout),
            platform,
            agent,
            transcriber,
            sink,
            call_timeout: settings.call_timeout,
            voice: settings.voice,
        }
    }

    /// Process one message to a terminal state, sending at most one reply.
    pub async fn dispatch(
        &self,
        message: InboundMessage,
        session: &mut ConversationSession,
    ) -> DispatchOutcome {
        let InboundMessage {
            sender_id,
            group_id,
            message_id,
            payload,
        } = message;
        let step = self
            .process(&sender_id, &group_id, payload, session)
            .await;

        let (text, reason) = match step {
            Step::Skip(reason) => {
                tracing::debug!(%group_id, %sender_id, ?reason, "dispatch skipped");
                return DispatchOutcome::Skipped(reason);
            }
            Step::Reply(text) => (text, None),
            Step::Fail(reason) => (reply::failure(&reason, self.tokenizer.marker()), Some(reason)),
        };

        let reply = OutboundReply::text(group_id.clone(), text).in_reply_to(message_id);
        if let Err(err) = self.sink.send_reply(reply.clone()).await {
            tracing::error!(%group_id, error = %err, "failed to deliver reply");
            return DispatchOutcome::Failed {
                reason: FailureReason::ReplyUndeliverable,
                reply: None,
            };
        }

        match reason {
            None => DispatchOutcome::Replied(reply),
            Some(reason) => {
                tracing::info!(%group_id, %sender_id, ?reason, "dispatch failed");
                DispatchOutcome::Failed {
                    reason,
                    reply: Some(reply),
                }
            }
        }
    }

    async fn process(
        &self,
        sender_id: &SenderId,
        group_id: &GroupId,
        payload: MessagePayload,
        session: &mut ConversationSession,
    ) -> Step {
        if !self.gate.admits_group(group_id) {
            return Step::Skip(SkipReason::GroupNotAllowed);
        }

        let text = match payload {
            MessagePayload::Text(text) => text,
            MessagePayload::Voice(clip) => match self.transcribe(clip).await {
                Ok(text) => {
                    tracing::info!(%group_id, %sender_id, %text, "voice transcribed");
                    text
                }
                Err(reason) => return Step::Skip(reason),
            },
        };
        let text = text.trim();
        if text.is_empty() {
            return Step::Skip(SkipReason::EmptyMessage);
        }

        if self.tokenizer.is_command(text) {
            match self.tokenizer.peek_verb(text).map(|verb| verb.parse::<Verb>()) {
                Some(Ok(verb)) => return self.command(sender_id, verb, text, session).await,
                Some(Err(unknown)) => {
                    tracing::debug!(verb = %unknown.0, "unknown verb, forwarding as natural language");
                }
                None => return Step::Fail(FailureReason::Parse(ParseError::MissingVerb)),
            }
            let stripped = text
                .strip_prefix(self.tokenizer.marker())
                .unwrap_or(text)
                .trim();
            return self.converse(stripped, session).await;
        }

        self.converse(text, session).await
    }

    async fn transcribe(&self, clip: VoiceClip) -> Result<String, SkipReason> {
        let Some(transcriber) = &self.transcriber else {
            return Err(SkipReason::VoiceUnsupported);
        };
        let request = TranscriptionRequest {
            clip,
            engine: self.voice.engine.clone(),
            region: self.voice.region.clone(),
        };
        let result = bounded(
            Collaborator::Transcription,
            self.call_timeout,
            transcriber.transcribe(request),
        )
        .await;
        match result {
            Ok(transcript) => transcript.into_text().ok_or(SkipReason::TranscriptionEmpty),
            Err(err) => {
                tracing::warn!(error = %err, "transcription failed, dropping message");
                Err(SkipReason::TranscriptionFailed)
            }
        }
    }

    async fn converse(&self, text: &str, session: &mut ConversationSession) -> Step {
        let request = ConversationRequest {
            text: text.to_string(),
            session_id: session.id.clone(),
        };
        let result = bounded(
            Collaborator::ConversationAgent,
            self.call_timeout,
            self.agent.converse(request),
        )
        .await;
        match result {
            Ok(answer) => {
                if let Some(id) = answer.session_id {
                    session.resume(id);
                }
                let text = answer.text.trim();
                if text.is_empty() {
                    Step::Reply(reply::REQUEST_PROCESSED.to_string())
                } else {
                    Step::Reply(text.to_string())
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "conversation agent call failed");
                Step::transport(&err, Collaborator::ConversationAgent)
            }
        }
    }

    async fn command(
        &self,
        sender_id: &SenderId,
        verb: Verb,
        text: &str,
        session: &mut ConversationSession,
    ) -> Step {
        let command = match self.tokenizer.tokenize(text) {
            Ok(command) => command,
            Err(err) => return Step::Fail(FailureReason::Parse(err)),
        };
        if let Err(denied) = self.gate.check(sender_id, verb) {
            return Step::Fail(FailureReason::PermissionDenied(denied));
        }
        tracing::debug!(%verb, args = command.args.len(), "running command");

        match verb {
            Verb::TurnOn | Verb::TurnOff | Verb::Toggle => self.switch(verb, &command).await,
            Verb::Script => self.script(&command).await,
            Verb::Climate => self.climate(&command).await,
            Verb::Info => self.info().await,
            Verb::Light => Step::Reply(reply::listing(EntityDomain::Light, &self.cache.snapshot())),
            Verb::Switch => {
                Step::Reply(reply::listing(EntityDomain::Switch, &self.cache.snapshot()))
            }
            Verb::Search => self.search(&command),
            Verb::Help => Step::Reply(reply::help(self.tokenizer.marker())),
            Verb::Refresh => match self.cache.refresh().await {
                Ok(report) => Step::Reply(reply::refreshed(&report)),
                Err(err) => Step::transport(&err, Collaborator::AutomationPlatform),
            },
            Verb::Clear => {
                session.reset();
                tracing::info!("conversation session cleared");
                Step::Reply(reply::SESSION_CLEARED.to_string())
            }
            Verb::Echo => {
                let text = command.joined_args();
                if text.is_empty() {
                    Step::Reply(verb.usage().to_string())
                } else {
                    Step::Reply(text)
                }
            }
        }
    }

    async fn switch(&self, verb: Verb, command: &ParsedCommand) -> Step {
        if command.args.is_empty() {
            return Step::validation(verb, ValidationError::MissingTarget);
        }
        let generation = self.cache.snapshot();
        let targets = self.resolver.resolve_all(&generation, &command.args);
        let results = self.executor.execute(verb, targets, &[]).await;
        Self::aggregate(verb, &results)
    }

    async fn script(&self, command: &ParsedCommand) -> Step {
        let target: Resolution = match command.args.as_slice() {
            [] => return Step::validation(Verb::Script, ValidationError::MissingTarget),
            [token] => match normalize_script_id(token) {
                Ok(id) => Ok(ResolvedTarget::exact(token.clone(), id)),
                Err(ValidationError::MalformedEntityId(_)) => {
                    self.resolver.resolve(&self.cache.snapshot(), token)
                }
                Err(err) => return Step::validation(Verb::Script, err),
            },
            many => {
                return Step::validation(Verb::Script, ValidationError::TooManyTargets(many.len()));
            }
        };
        let results = self.executor.execute(Verb::Script, vec![target], &[]).await;
        Self::aggregate(Verb::Script, &results)
    }

    async fn climate(&self, command: &ParsedCommand) -> Step {
        let Some((token, settings)) = command.args.split_first() else {
            return Step::validation(Verb::Climate, ValidationError::MissingTarget);
        };
        if settings.is_empty() {
            return Step::validation(Verb::Climate, ValidationError::MissingClimateSetting);
        }
        let target = self.resolver.resolve(&self.cache.snapshot(), token);
        let results = self.executor.execute(Verb::Climate, vec![target], settings).await;
        Self::aggregate(Verb::Climate, &results)
    }

    async fn info(&self) -> Step {
        let result = bounded(
            Collaborator::AutomationPlatform,
            self.call_timeout,
            self.platform.get_context_snapshot(),
        )
        .await;
        match result {
            Ok(snapshot) => Step::Reply(reply::context(&snapshot)),
            Err(err) => Step::transport(&err, Collaborator::AutomationPlatform),
        }
    }

    fn search(&self, command: &ParsedCommand) -> Step {
        let query = command.joined_args();
        if query.trim().is_empty() {
            return Step::validation(Verb::Search, ValidationError::MissingQuery);
        }
        let generation = self.cache.snapshot();
        let hits = generation.search(&query);
        Step::Reply(reply::search_results(&query, &hits))
    }

    /// Failed when every target that reached the platform found it unreachable.
    fn aggregate(verb: Verb, results: &[CommandResult]) -> Step {
        let attempted: Vec<_> = results.iter().filter(|r| r.entity_id.is_some()).collect();
        let unreachable = attempted
            .iter()
            .filter_map(|r| r.failure())
            .filter(|failure| failure.is_unreachable())
            .count();
        if !attempted.is_empty() && unreachable == attempted.len() {
            let kind = attempted
                .iter()
                .filter_map(|r| r.failure())
                .find_map(|failure| match failure {
                    TargetFailure::Transport { kind, .. } => Some(*kind),
                    _ => None,
                })
                .unwrap_or(TransportErrorKind::Unreachable);
            return Step::Fail(FailureReason::Transport {
                collaborator: Collaborator::AutomationPlatform,
                kind,
            });
        }
        Step::Reply(reply::command_results(verb, results))
    }
}

impl<P, C, T, S> Dispatch for DispatchRouter<P, C, T, S>
where
    P: AutomationPlatform + Clone + 'static,
    C: ConversationAgent + 'static,
    T: Transcriber + 'static,
    S: ReplySink + 'static,
{
    fn dispatch(
        &self,
        message: InboundMessage,
        session: &mut ConversationSession,
    ) -> impl Future<Output = DispatchOutcome> + Send {
        DispatchRouter::dispatch(self, message, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use hassbridge_domain::context::ContextSnapshot;
    use hassbridge_domain::entity::{AttributeValue, EntityRecord, EntityState};
    use hassbridge_domain::error::TransportError;
    use hassbridge_domain::id::EntityId;
    use hassbridge_domain::message::ReplyBody;
    use hassbridge_domain::outcome::{ActionCall, ActionResponse};

    use crate::ports::{ConversationReply, Transcript};
    use crate::services::AliasTable;

    #[derive(Default)]
    struct FakePlatform {
        records: Vec<EntityRecord>,
        calls: Mutex<Vec<ActionCall>>,
        scripts: Mutex<Vec<EntityId>>,
        unreachable: bool,
    }

    fn unreachable() -> BridgeError {
        TransportError::new(
            Collaborator::AutomationPlatform,
            TransportErrorKind::Unreachable,
        )
        .into()
    }

    impl AutomationPlatform for FakePlatform {
        fn list_entities(
            &self,
        ) -> impl Future<Output = Result<Vec<EntityRecord>, BridgeError>> + Send {
            let records = self.records.clone();
            async move { Ok(records) }
        }

        fn call_action(
            &self,
            call: ActionCall,
        ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
            self.calls.lock().unwrap().push(call);
            let unreachable_now = self.unreachable;
            async move {
                if unreachable_now {
                    Err(unreachable())
                } else {
                    Ok(ActionResponse::with_state(EntityState::On))
                }
            }
        }

        fn run_script(
            &self,
            script_id: EntityId,
        ) -> impl Future<Output = Result<ActionResponse, BridgeError>> + Send {
            self.scripts.lock().unwrap().push(script_id);
            async { Ok(ActionResponse::default()) }
        }

        fn get_context_snapshot(
            &self,
        ) -> impl Future<Output = Result<ContextSnapshot, BridgeError>> + Send {
            let result = if self.unreachable {
                Err(unreachable())
            } else {
                Ok(ContextSnapshot::from_records(&self.records))
            };
            async move { result }
        }
    }

    #[derive(Default)]
    struct FakeAgent {
        requests: Mutex<Vec<ConversationRequest>>,
        silent: bool,
    }

    impl ConversationAgent for FakeAgent {
        fn converse(
            &self,
            request: ConversationRequest,
        ) -> impl Future<Output = Result<ConversationReply, BridgeError>> + Send {
            let mut requests = self.requests.lock().unwrap();
            let turn = requests.len() + 1;
            let text = if self.silent {
                String::new()
            } else {
                format!("you said: {}", request.text)
            };
            requests.push(request);
            async move {
                Ok(ConversationReply {
                    text,
                    session_id: Some(format!("session-{turn}")),
                })
            }
        }
    }

    enum FakeTranscriber {
        Says(&'static str),
        Hears(Transcript),
        Broken,
    }

    impl Transcriber for FakeTranscriber {
        fn transcribe(
            &self,
            _request: TranscriptionRequest,
        ) -> impl Future<Output = Result<Transcript, BridgeError>> + Send {
            let result = match self {
                Self::Says(text) => Ok(Transcript::Text((*text).to_string())),
                Self::Hears(transcript) => Ok(transcript.clone()),
                Self::Broken => Err(TransportError::new(
                    Collaborator::Transcription,
                    TransportErrorKind::Rejected { status: 500 },
                )
                .into()),
            };
            async move { result }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<OutboundReply>>,
        broken: bool,
    }

    impl ReplySink for RecordingSink {
        fn send_reply(
            &self,
            reply: OutboundReply,
        ) -> impl Future<Output = Result<(), BridgeError>> + Send {
            let result = if self.broken {
                Err(TransportError::new(
                    Collaborator::ChatTransport,
                    TransportErrorKind::Unreachable,
                )
                .into())
            } else {
                self.sent.lock().unwrap().push(reply);
                Ok(())
            };
            async move { result }
        }
    }

    type TestRouter = DispatchRouter<
        Arc<FakePlatform>,
        Arc<FakeAgent>,
        Arc<FakeTranscriber>,
        Arc<RecordingSink>,
    >;

    struct Harness {
        router: TestRouter,
        platform: Arc<FakePlatform>,
        agent: Arc<FakeAgent>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn sent(&self) -> Vec<OutboundReply> {
            self.sink.sent.lock().unwrap().clone()
        }

        fn services(&self) -> Vec<String> {
            self.platform
                .calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| format!("{} {}", c.qualified_service(), c.entity_id))
                .collect()
        }
    }

    struct Setup {
        platform: FakePlatform,
        agent: FakeAgent,
        transcriber: Option<FakeTranscriber>,
        sink: RecordingSink,
        settings: DispatchSettings,
        aliases: AliasTable,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                platform: FakePlatform {
                    records: home(),
                    ..FakePlatform::default()
                },
                agent: FakeAgent::default(),
                transcriber: None,
                sink: RecordingSink::default(),
                settings: DispatchSettings::default(),
                aliases: AliasTable::from([(
                    EntityId::parse("light.living_room").unwrap(),
                    vec!["客厅灯".to_string()],
                )]),
            }
        }
    }

    impl Setup {
        async fn build(self) -> Harness {
            let platform = Arc::new(self.platform);
            let agent = Arc::new(self.agent);
            let sink = Arc::new(self.sink);
            let cache = Arc::new(DirectoryCache::new(Arc::clone(&platform)).with_aliases(self.aliases));
            cache.refresh().await.unwrap();
            let router = DispatchRouter::new(
                cache,
                Arc::clone(&platform),
                Arc::clone(&agent),
                self.transcriber.map(Arc::new),
                Arc::clone(&sink),
                self.settings,
            );
            Harness {
                router,
                platform,
                agent,
                sink,
            }
        }
    }

    fn home() -> Vec<EntityRecord> {
        let entity = |id: &str, name: &str, area: &str, state: EntityState| {
            EntityRecord::builder()
                .entity_id(id)
                .friendly_name(name)
                .area(area)
                .state(state)
                .build()
                .unwrap()
        };
        vec![
            entity("light.living_room", "Living Room Light", "Living Room", EntityState::On),
            entity("light.bedroom", "Bedroom Light", "Bedroom", EntityState::Off),
            entity("switch.fan", "Fan", "Bedroom", EntityState::Off),
            entity(
                "climate.bedroom",
                "Bedroom AC",
                "Bedroom",
                EntityState::Value("cool".to_string()),
            ),
            EntityRecord::builder()
                .entity_id("sensor.outdoor_temperature")
                .friendly_name("Outdoor")
                .state(EntityState::from("18.5"))
                .attribute("unit_of_measurement", AttributeValue::String("°C".into()))
                .build()
                .unwrap(),
        ]
    }

    fn text(sender: &str, body: &str) -> InboundMessage {
        InboundMessage::text(
            SenderId::new(sender).unwrap(),
            GroupId::new("42").unwrap(),
            body,
        )
    }

    fn voice(sender: &str) -> InboundMessage {
        InboundMessage::voice(
            SenderId::new(sender).unwrap(),
            GroupId::new("42").unwrap(),
            VoiceClip {
                audio: vec![1, 2, 3],
                format: "mp3".to_string(),
            },
        )
    }

    fn body(outcome: &DispatchOutcome) -> String {
        outcome
            .reply()
            .and_then(OutboundReply::text_body)
            .unwrap_or_default()
            .to_string()
    }

    fn allow_only(senders: &[&str]) -> DispatchSettings {
        DispatchSettings {
            allowed_senders: senders.iter().map(|s| SenderId::new(*s).unwrap()).collect(),
            ..DispatchSettings::default()
        }
    }

    #[tokio::test]
    async fn should_execute_quoted_and_bare_targets() {
        let h = Setup::default().build().await;
        let mut session = ConversationSession::default();

        let outcome = h
            .router
            .dispatch(
                text("111", r#"/turnon "Living Room Light" light.bedroom"#),
                &mut session,
            )
            .await;

        assert!(outcome.is_replied());
        assert_eq!(
            h.services(),
            vec![
                "light.turn_on light.living_room",
                "light.turn_on light.bedroom"
            ]
        );
        assert!(body(&outcome).starts_with("turnon: 2/2 succeeded"));
        assert_eq!(h.sent().len(), 1);
    }

    #[tokio::test]
    async fn should_report_not_found_target_without_aborting_siblings() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/turnoff fan garage"), &mut ConversationSession::default())
            .await;

        assert!(outcome.is_replied());
        assert_eq!(h.services(), vec!["switch.turn_off switch.fan"]);
        let reply = body(&outcome);
        assert!(reply.contains("1/2 succeeded"));
        assert!(reply.contains("✗ garage: no entity matches \"garage\""));
    }

    #[tokio::test]
    async fn should_deny_mutating_verb_before_execution() {
        let h = Setup {
            settings: allow_only(&["111"]),
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(text("222", "/turnoff fan"), &mut ConversationSession::default())
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                reason: FailureReason::PermissionDenied(_),
                reply: Some(_),
            }
        ));
        assert!(h.services().is_empty());
    }

    #[tokio::test]
    async fn should_let_unlisted_sender_run_read_only_verb() {
        let h = Setup {
            settings: allow_only(&["111"]),
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(text("222", "/light"), &mut ConversationSession::default())
            .await;

        assert!(outcome.is_replied());
        let reply = body(&outcome);
        assert!(reply.contains("Living Room Light (light.living_room): on"));
        assert!(!reply.contains("switch.fan"));
    }

    #[tokio::test]
    async fn should_fail_with_parse_reply_for_unterminated_quote() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", r#"/turnon "Living Room"#), &mut ConversationSession::default())
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                reason: FailureReason::Parse(ParseError::UnterminatedQuote { .. }),
                ..
            }
        ));
        assert!(h.services().is_empty());
        assert_eq!(h.sent().len(), 1);
    }

    #[tokio::test]
    async fn should_fail_with_transport_reply_when_platform_unreachable() {
        let h = Setup {
            platform: FakePlatform {
                records: home(),
                unreachable: true,
                ..FakePlatform::default()
            },
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(text("111", "/turnon fan"), &mut ConversationSession::default())
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                reason: FailureReason::Transport {
                    collaborator: Collaborator::AutomationPlatform,
                    kind: TransportErrorKind::Unreachable,
                },
                ..
            }
        ));
        assert!(body(&outcome).contains("not available"));
    }

    #[tokio::test]
    async fn should_resolve_configured_alias() {
        let h = Setup::default().build().await;

        h.router
            .dispatch(text("111", "/toggle 客厅灯"), &mut ConversationSession::default())
            .await;

        assert_eq!(h.services(), vec!["light.toggle light.living_room"]);
    }

    #[tokio::test]
    async fn should_forward_natural_language_and_keep_session() {
        let h = Setup::default().build().await;
        let mut session = ConversationSession::default();

        let first = h.router.dispatch(text("111", "打开客厅灯"), &mut session).await;
        let second = h.router.dispatch(text("111", "谢谢"), &mut session).await;

        assert_eq!(body(&first), "you said: 打开客厅灯");
        assert!(second.is_replied());
        let requests = h.agent.requests.lock().unwrap();
        assert_eq!(requests[0].session_id, None);
        assert_eq!(requests[1].session_id.as_deref(), Some("session-1"));
        assert_eq!(session.id(), Some("session-2"));
    }

    #[tokio::test]
    async fn should_reset_session_on_clear() {
        let h = Setup::default().build().await;
        let mut session = ConversationSession::default();
        h.router.dispatch(text("111", "hello"), &mut session).await;
        assert!(session.id().is_some());

        let outcome = h.router.dispatch(text("111", "/clear"), &mut session).await;

        assert_eq!(body(&outcome), reply::SESSION_CLEARED);
        assert_eq!(session.id(), None);
    }

    #[tokio::test]
    async fn should_forward_unknown_verb_without_marker() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/weather tomorrow"), &mut ConversationSession::default())
            .await;

        assert!(outcome.is_replied());
        assert_eq!(h.agent.requests.lock().unwrap()[0].text, "weather tomorrow");
    }

    #[tokio::test]
    async fn should_substitute_fixed_text_for_empty_agent_reply() {
        let h = Setup {
            agent: FakeAgent {
                silent: true,
                ..FakeAgent::default()
            },
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(text("111", "good night"), &mut ConversationSession::default())
            .await;

        assert_eq!(body(&outcome), reply::REQUEST_PROCESSED);
    }

    #[tokio::test]
    async fn should_run_transcribed_voice_command() {
        let h = Setup {
            transcriber: Some(FakeTranscriber::Says("/turnon fan")),
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(voice("111"), &mut ConversationSession::default())
            .await;

        assert!(outcome.is_replied());
        assert_eq!(h.services(), vec!["switch.turn_on switch.fan"]);
    }

    #[tokio::test]
    async fn should_skip_silently_when_transcription_is_empty() {
        let h = Setup {
            transcriber: Some(FakeTranscriber::Hears(Transcript::NoResult)),
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(voice("111"), &mut ConversationSession::default())
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::TranscriptionEmpty));
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn should_skip_silently_when_transcription_fails() {
        let h = Setup {
            transcriber: Some(FakeTranscriber::Broken),
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(voice("111"), &mut ConversationSession::default())
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::TranscriptionFailed));
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn should_skip_voice_when_no_transcriber_configured() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(voice("111"), &mut ConversationSession::default())
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::VoiceUnsupported));
    }

    #[tokio::test]
    async fn should_skip_messages_from_unlisted_group() {
        let h = Setup {
            settings: DispatchSettings {
                allowed_groups: vec![GroupId::new("7").unwrap()],
                ..DispatchSettings::default()
            },
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(text("111", "/help"), &mut ConversationSession::default())
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::GroupNotAllowed));
        assert!(h.sent().is_empty());
    }

    #[tokio::test]
    async fn should_thread_reply_to_inbound_message() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(
                text("111", "/help").with_message_id("9001"),
                &mut ConversationSession::default(),
            )
            .await;

        assert_eq!(outcome.reply().unwrap().reply_to.as_deref(), Some("9001"));
        assert!(matches!(h.sent()[0].body, ReplyBody::Text { .. }));
    }

    #[tokio::test]
    async fn should_fail_when_reply_cannot_be_delivered() {
        let h = Setup {
            sink: RecordingSink {
                broken: true,
                ..RecordingSink::default()
            },
            ..Setup::default()
        }
        .build()
        .await;

        let outcome = h
            .router
            .dispatch(text("111", "/help"), &mut ConversationSession::default())
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                reason: FailureReason::ReplyUndeliverable,
                reply: None,
            }
        );
    }

    #[tokio::test]
    async fn should_gate_refresh_and_report_entity_count() {
        let h = Setup {
            settings: allow_only(&["111"]),
            ..Setup::default()
        }
        .build()
        .await;

        let denied = h
            .router
            .dispatch(text("222", "/refresh"), &mut ConversationSession::default())
            .await;
        let allowed = h
            .router
            .dispatch(text("111", "/refresh"), &mut ConversationSession::default())
            .await;

        assert!(matches!(
            denied,
            DispatchOutcome::Failed {
                reason: FailureReason::PermissionDenied(_),
                ..
            }
        ));
        assert!(body(&allowed).starts_with("Directory refreshed: 5 entities"));
    }

    #[tokio::test]
    async fn should_require_single_script_target() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/script a b"), &mut ConversationSession::default())
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                reason: FailureReason::Validation {
                    error: ValidationError::TooManyTargets(2),
                    ..
                },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_run_bare_script_name() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/script good_night"), &mut ConversationSession::default())
            .await;

        assert!(outcome.is_replied());
        assert_eq!(
            *h.platform.scripts.lock().unwrap(),
            vec![EntityId::parse("script.good_night").unwrap()]
        );
    }

    #[tokio::test]
    async fn should_set_climate_by_friendly_name() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(
                text("111", r#"/climate "Bedroom AC" heat 22℃"#),
                &mut ConversationSession::default(),
            )
            .await;

        assert!(outcome.is_replied());
        assert_eq!(
            h.services(),
            vec![
                "climate.set_hvac_mode climate.bedroom",
                "climate.set_temperature climate.bedroom"
            ]
        );
    }

    #[tokio::test]
    async fn should_report_malformed_temperature_per_target() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(
                text("111", r#"/climate "Bedroom AC" 2x"#),
                &mut ConversationSession::default(),
            )
            .await;

        assert!(outcome.is_replied());
        assert!(body(&outcome).contains("invalid temperature \"2x\""));
        assert!(h.services().is_empty());
    }

    #[tokio::test]
    async fn should_require_climate_setting() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/climate bedroom"), &mut ConversationSession::default())
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                reason: FailureReason::Validation {
                    error: ValidationError::MissingClimateSetting,
                    ..
                },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn should_search_directory() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/search bedroom"), &mut ConversationSession::default())
            .await;

        let reply = body(&outcome);
        assert!(reply.starts_with("2 result(s)"));
        assert!(reply.contains("climate.bedroom"));
        assert!(reply.contains("light.bedroom"));
    }

    #[tokio::test]
    async fn should_render_context_for_info() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/info"), &mut ConversationSession::default())
            .await;

        let reply = body(&outcome);
        assert!(reply.contains("Living Room Light"));
        assert!(reply.contains("Outdoor 18.5°C"));
    }

    #[tokio::test]
    async fn should_echo_arguments() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", r#"/echo hello "big world""#), &mut ConversationSession::default())
            .await;

        assert_eq!(body(&outcome), "hello big world");
    }

    #[tokio::test]
    async fn should_reject_command_without_verb() {
        let h = Setup::default().build().await;

        let outcome = h
            .router
            .dispatch(text("111", "/"), &mut ConversationSession::default())
            .await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                reason: FailureReason::Parse(ParseError::MissingVerb),
                ..
            }
        ));
    }
}
