//! Gateway HTTP server: health route and the signed platform webhook.

use crate::channels::{Event, LineClient, MessageEvent, MessagingClient, WebhookEnvelope};
use crate::config::{self, Config};
use crate::dispatch::Dispatcher;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::mpsc;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook body signature.
const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Shared state for the gateway (config, signature secret, inbound queue).
#[derive(Clone)]
struct GatewayState {
    config: Arc<Config>,
    /// When Some, webhook POSTs must carry a valid signature of the raw body.
    channel_secret: Option<String>,
    /// Sender for decoded webhook events. Processor task receives.
    inbound_tx: mpsc::Sender<MessageEvent>,
}

/// Verify a webhook signature: the header value is base64(HMAC-SHA256 of the
/// raw request body keyed with the channel secret).
fn signature_valid(secret: &str, body: &[u8], provided: &str) -> bool {
    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// When bind is not loopback, a channel secret must be configured or startup
/// fails (an open webhook would accept forged events).
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    let channel_secret = config::resolve_channel_secret(&config);
    if !config::is_loopback_bind(&bind) && channel_secret.is_none() {
        anyhow::bail!(
            "refusing to bind gateway to {} without webhook signature verification (set channels.line.channelSecret or LINE_CHANNEL_SECRET)",
            bind
        );
    }

    let access_token = config::resolve_channel_access_token(&config).unwrap_or_default();
    if access_token.is_empty() {
        log::warn!(
            "channel access token not configured; replies will be rejected by the platform (set channels.line.channelAccessToken or LINE_CHANNEL_ACCESS_TOKEN)"
        );
    }
    let client: Arc<dyn MessagingClient> = Arc::new(LineClient::new(
        access_token,
        config.channels.line.api_base.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(client, config::resolve_public_url(&config)));

    let (inbound_tx, mut inbound_rx) = mpsc::channel::<MessageEvent>(64);
    {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            while let Some(event) = inbound_rx.recv().await {
                if let Err(e) = dispatcher.dispatch(&event).await {
                    log::warn!("dispatch failed: {}", e);
                }
            }
        });
    }

    let state = GatewayState {
        config: Arc::new(config.clone()),
        channel_secret,
        inbound_tx,
    };
    let app = Router::new()
        .route("/", get(health_http))
        .route("/line/webhook", post(line_webhook))
        .with_state(state);

    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /line/webhook — verifies the body signature, decodes the envelope,
/// queues message events, returns 200 immediately.
async fn line_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(ref secret) = state.channel_secret {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !signature_valid(secret, &body, provided) {
            return StatusCode::FORBIDDEN;
        }
    }
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(_) => return StatusCode::BAD_REQUEST,
    };
    for event in envelope.events {
        match event {
            Event::Message(msg) => {
                if state.inbound_tx.send(msg).await.is_err() {
                    return StatusCode::SERVICE_UNAVAILABLE;
                }
            }
            Event::Other => log::debug!("ignoring unsupported webhook event"),
        }
    }
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}
