//! Websocket connection to the OneBot implementation.
//!
//! A background task owns the socket, reconnects with exponential backoff,
//! forwards group messages on a channel and routes action answers back to
//! their callers by `echo`. [`OneBotClient`] is the cheap, cloneable handle
//! used to send actions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};

use hassbridge_app::ports::ReplySink;
use hassbridge_domain::error::BridgeError;
use hassbridge_domain::message::{InboundMessage, OutboundReply, VoiceClip};

use crate::action::{self, ActionFrame};
use crate::config::OneBotConfig;
use crate::error::OneBotError;
use crate::event::{ActionReply, Frame, Incoming, MentionFilter};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const INBOUND_CAPACITY: usize = 256;
const RECORD_FORMAT: &str = "mp3";

/// State shared between the handles and the connection task.
struct Connection {
    up: watch::Sender<bool>,
    pending: Mutex<HashMap<String, oneshot::Sender<ActionReply>>>,
}

impl Connection {
    fn new() -> Self {
        Self {
            up: watch::Sender::new(false),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<ActionReply>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, echo: &str) -> oneshot::Receiver<ActionReply> {
        let (sender, receiver) = oneshot::channel();
        self.pending().insert(echo.to_string(), sender);
        receiver
    }

    fn forget(&self, echo: &str) {
        self.pending().remove(echo);
    }

    fn resolve(&self, reply: ActionReply) {
        match self.pending().remove(&reply.echo) {
            Some(waiter) => {
                let _ = waiter.send(reply);
            }
            None => tracing::debug!(echo = %reply.echo, "answer for unknown or expired action"),
        }
    }

    /// Drop every waiter; their callers observe a disconnect.
    fn fail_all(&self) {
        let dropped = {
            let mut pending = self.pending();
            let count = pending.len();
            pending.clear();
            count
        };
        if dropped > 0 {
            tracing::warn!(dropped, "connection lost with actions in flight");
        }
    }
}

/// Handle for sending OneBot actions over the shared connection.
#[derive(Clone)]
pub struct OneBotClient {
    connection: Arc<Connection>,
    outbox: mpsc::UnboundedSender<String>,
    http: reqwest::Client,
    http_base: String,
    action_timeout: Duration,
}

impl std::fmt::Debug for OneBotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneBotClient")
            .field("http_base", &self.http_base)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Start the connection task.
///
/// Returns the action handle and the stream of inbound group messages
/// (text, or voice already fetched). The task stops once the receiver is
/// dropped.
///
/// # Errors
///
/// Returns [`OneBotError::InvalidRequest`] when the URL or access token
/// cannot form a websocket request.
pub fn spawn(config: OneBotConfig) -> Result<(OneBotClient, mpsc::Receiver<InboundMessage>), OneBotError> {
    request(&config)?;

    let (outbox, outbox_rx) = mpsc::unbounded_channel();
    let (inbound, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let client = OneBotClient {
        connection: Arc::new(Connection::new()),
        outbox,
        http: reqwest::Client::new(),
        http_base: config.http_base(),
        action_timeout: config.action_timeout(),
    };

    tokio::spawn(connection_loop(config, client.clone(), inbound, outbox_rx));
    Ok((client, inbound_rx))
}

fn request(config: &OneBotConfig) -> Result<Request, OneBotError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(OneBotError::InvalidRequest)?;
    if !config.access_token.is_empty() {
        let value = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|err| OneBotError::InvalidRequest(tungstenite::Error::HttpFormat(err.into())))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

impl OneBotClient {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.connection.up.borrow()
    }

    /// Wait until the websocket is up.
    pub async fn connected(&self) {
        let mut state = self.connection.up.subscribe();
        let _ = state.wait_for(|up| *up).await;
    }

    /// Send an action and wait for its answer.
    ///
    /// # Errors
    ///
    /// - [`OneBotError::Disconnected`] when no connection is up or it drops
    ///   before the answer arrives
    /// - [`OneBotError::Timeout`] when no answer arrives in time
    /// - [`OneBotError::ActionFailed`] when the implementation reports a failure
    pub async fn call(&self, action: &str, params: Value) -> Result<Value, OneBotError> {
        if !self.is_connected() {
            return Err(OneBotError::Disconnected);
        }
        let frame = ActionFrame::new(action, params);
        let json = serde_json::to_string(&frame).map_err(OneBotError::Json)?;

        let answer = self.connection.register(&frame.echo);
        if self.outbox.send(json).is_err() {
            self.connection.forget(&frame.echo);
            return Err(OneBotError::Disconnected);
        }
        tracing::debug!(action, echo = %frame.echo, "action sent");

        let reply = match tokio::time::timeout(self.action_timeout, answer).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(OneBotError::Disconnected),
            Err(_) => {
                self.connection.forget(&frame.echo);
                return Err(OneBotError::Timeout {
                    action: action.to_string(),
                });
            }
        };
        if reply.is_ok() {
            Ok(reply.data)
        } else {
            Err(OneBotError::ActionFailed {
                action: action.to_string(),
                retcode: reply.retcode,
            })
        }
    }

    /// Retrieve a voice record as mp3.
    ///
    /// # Errors
    ///
    /// Fails when the action fails or the returned audio cannot be read.
    pub async fn fetch_record(&self, file: &str) -> Result<VoiceClip, OneBotError> {
        let data = self.call("get_record", action::get_record(file)).await?;
        let record: RecordData = serde_json::from_value(data).map_err(OneBotError::Json)?;

        let audio = if let Some(encoded) = record.base64.filter(|b| !b.is_empty()) {
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(OneBotError::InvalidBase64)?
        } else {
            let location = record
                .url
                .into_iter()
                .chain(record.file)
                .find(|loc| !loc.is_empty())
                .ok_or(OneBotError::MissingRecord)?;
            self.download(&location).await?
        };

        Ok(VoiceClip {
            audio,
            format: RECORD_FORMAT.to_string(),
        })
    }

    async fn download(&self, location: &str) -> Result<Vec<u8>, OneBotError> {
        let url = if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else {
            format!("{}/{}", self.http_base, location.trim_start_matches('/'))
        };
        tracing::debug!(%url, "downloading voice record");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(OneBotError::Download)?;
        let bytes = response.bytes().await.map_err(OneBotError::Download)?;
        Ok(bytes.to_vec())
    }
}

/// `data` of a `get_record` answer.
#[derive(Debug, Default, Deserialize)]
struct RecordData {
    #[serde(default)]
    base64: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file: Option<String>,
}

impl ReplySink for OneBotClient {
    fn send_reply(&self, reply: OutboundReply) -> impl Future<Output = Result<(), BridgeError>> + Send {
        async move {
            let group_id = reply.group_id.clone();
            self.call("send_group_msg", action::send_group_msg(&reply))
                .await
                .map_err(|err| {
                    tracing::warn!(%group_id, error = %err, "failed to send group message");
                    BridgeError::from(err)
                })?;
            Ok(())
        }
    }
}

async fn connection_loop(
    config: OneBotConfig,
    client: OneBotClient,
    inbound: mpsc::Sender<InboundMessage>,
    mut outbox: mpsc::UnboundedReceiver<String>,
) {
    let filter = MentionFilter {
        self_id: config.self_id.clone(),
        require_mention: config.require_mention,
    };
    let mut backoff = INITIAL_BACKOFF;

    loop {
        tracing::info!(url = %config.url, "connecting to OneBot");
        match connect_and_run(&config, &client, &filter, &inbound, &mut outbox).await {
            Ok(()) => tracing::info!("OneBot connection closed"),
            Err(err) => tracing::error!(error = %err, "OneBot connection error"),
        }

        if client.connection.up.send_replace(false) {
            backoff = INITIAL_BACKOFF;
        }
        client.connection.fail_all();

        if inbound.is_closed() {
            tracing::debug!("inbound receiver dropped, stopping OneBot connection");
            return;
        }
        tracing::info!(delay_ms = backoff.as_millis(), "reconnecting after delay");
        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            () = inbound.closed() => return,
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn connect_and_run(
    config: &OneBotConfig,
    client: &OneBotClient,
    filter: &MentionFilter,
    inbound: &mpsc::Sender<InboundMessage>,
    outbox: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), OneBotError> {
    let (stream, _response) = tokio_tungstenite::connect_async(request(config)?)
        .await
        .map_err(OneBotError::WebSocket)?;
    let (mut sink, mut reader) = stream.split();

    // Frames queued while disconnected belong to callers that already failed.
    while outbox.try_recv().is_ok() {}
    client.connection.up.send_replace(true);
    tracing::info!(url = %config.url, "connected to OneBot");

    loop {
        tokio::select! {
            () = inbound.closed() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
            msg = reader.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(text.as_str(), client, filter, inbound).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    sink.send(Message::Pong(data)).await.map_err(OneBotError::WebSocket)?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(OneBotError::WebSocket(err)),
            },
            json = outbox.recv() => match json {
                Some(json) => sink.send(Message::Text(json.into())).await.map_err(OneBotError::WebSocket)?,
                None => return Ok(()),
            },
        }
    }
}

async fn handle_frame(
    text: &str,
    client: &OneBotClient,
    filter: &MentionFilter,
    inbound: &mpsc::Sender<InboundMessage>,
) {
    let message = match Frame::parse(text) {
        Ok(Frame::Reply(reply)) => {
            client.connection.resolve(reply);
            return;
        }
        Ok(Frame::GroupMessage(message)) => message,
        Ok(Frame::Ignored) => return,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring malformed OneBot frame");
            return;
        }
    };

    match message.into_incoming(filter) {
        Some(Incoming::Text(message)) => {
            tracing::debug!(group_id = %message.group_id, sender_id = %message.sender_id, "group message received");
            let _ = inbound.send(message).await;
        }
        // The answer to get_record arrives on this same loop, so fetch elsewhere.
        Some(Incoming::Voice {
            sender_id,
            group_id,
            message_id,
            file,
        }) => {
            let client = client.clone();
            let inbound = inbound.clone();
            tokio::spawn(async move {
                match client.fetch_record(&file).await {
                    Ok(clip) => {
                        tracing::debug!(%group_id, %sender_id, ?clip, "voice message received");
                        let mut message = InboundMessage::voice(sender_id, group_id, clip);
                        message.message_id = message_id;
                        let _ = inbound.send(message).await;
                    }
                    Err(err) => {
                        tracing::warn!(%group_id, %file, error = %err, "failed to fetch voice record, dropping message");
                    }
                }
            });
        }
        None => {}
    }
}
