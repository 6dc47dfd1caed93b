//! # hassbridged — hassbridge daemon
//!
//! Composition root that wires all adapters together and runs the bridge.
//!
//! ## Responsibilities
//! - Load configuration (`hassbridge.toml` plus environment overrides)
//! - Initialise structured logging
//! - Construct the automation platform: Home Assistant when configured,
//!   the in-memory virtual home otherwise
//! - Warm the entity directory and keep it refreshed
//! - Connect to the chat transport and feed inbound messages to the
//!   per-group sequencer
//! - Serve the webhook and shut down on SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use hassbridge_adapter_homeassistant::HomeAssistant;
use hassbridge_adapter_http_axum::WebhookState;
use hassbridge_adapter_onebot::OneBotClient;
use hassbridge_adapter_tencent_asr::TencentAsr;
use hassbridge_adapter_virtual::{EchoAgent, VirtualPlatform};
use hassbridge_app::dispatcher::DispatchRouter;
use hassbridge_app::ports::{AutomationPlatform, ConversationAgent};
use hassbridge_app::sequencer::Sequencer;
use hassbridge_app::services::DirectoryCache;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    match &config.homeassistant {
        Some(ha) => {
            let client = HomeAssistant::new(ha).context("building Home Assistant client")?;
            tracing::info!(url = %ha.base_url(), "using Home Assistant");
            run(&config, client.clone(), client).await
        }
        None => {
            tracing::warn!("no [homeassistant] section configured, using the virtual home");
            let platform = Arc::new(VirtualPlatform::demo().context("building virtual home")?);
            run(&config, platform, EchoAgent::default()).await
        }
    }
}

async fn run<P, C>(config: &Config, platform: P, agent: C) -> anyhow::Result<()>
where
    P: AutomationPlatform + Clone + 'static,
    C: ConversationAgent + 'static,
{
    // Directory
    let cache = Arc::new(
        DirectoryCache::new(platform.clone())
            .with_aliases(config.alias_table()?)
            .with_call_timeout(config.call_timeout()),
    );
    match cache.refresh().await {
        Ok(report) => tracing::info!(
            generation = report.generation,
            entities = report.entity_count,
            "entity directory loaded"
        ),
        Err(err) => tracing::warn!(error = %err, "initial directory load failed, retrying later"),
    }
    if let Some(interval) = config.refresh_interval() {
        tokio::spawn(refresh_periodically(Arc::clone(&cache), interval));
    }

    // Transcription
    let transcriber = match &config.voice {
        Some(voice) => {
            tracing::info!(engine = %voice.engine, "voice transcription enabled");
            Some(TencentAsr::new(&voice.asr).context("building Tencent ASR client")?)
        }
        None => {
            tracing::info!("voice transcription disabled");
            None
        }
    };

    // Chat transport
    let (chat, mut inbound) =
        hassbridge_adapter_onebot::spawn(config.onebot.clone()).context("starting OneBot client")?;
    let chat: Arc<OneBotClient> = Arc::new(chat);

    // Dispatch
    let router = DispatchRouter::new(
        cache,
        platform,
        agent,
        transcriber,
        Arc::clone(&chat),
        config.dispatch_settings(),
    );
    let sequencer = Sequencer::new(router).with_capacity(config.dispatch.mailbox_capacity);
    let pump = tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            if let Err(err) = sequencer.submit(message) {
                tracing::warn!(error = %err, "inbound message dropped");
            }
        }
        tracing::info!("chat transport closed");
    });

    // Webhook
    let app = hassbridge_adapter_http_axum::build(WebhookState::new(
        Arc::clone(&chat),
        config.webhook.token.as_str(),
    ));
    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding webhook listener on {bind_addr}"))?;
    tracing::info!("hassbridged listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving webhook")?;

    pump.abort();
    tracing::info!("hassbridged stopped");
    Ok(())
}

async fn refresh_periodically<P: AutomationPlatform>(cache: Arc<DirectoryCache<P>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately and the directory was just loaded.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match cache.refresh().await {
            Ok(report) => tracing::debug!(
                generation = report.generation,
                entities = report.entity_count,
                installed = report.installed,
                "entity directory refreshed"
            ),
            Err(err) => tracing::warn!(error = %err, "periodic directory refresh failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
