// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Webhook server for inbound signals and Telegram button presses.
//!
//! Handlers never touch tracker state directly: they normalize payloads
//! into events and queue them for the single-writer event loop.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn default_ticker() -> String {
    "CRYPTO?".to_string()
}

/// Inbound TradingView-style alert body. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalPayload {
    #[serde(default = "default_ticker")]
    pub ticker: String,
    #[serde(default)]
    pub signal: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub extra: String,
}

/// Telegram update, reduced to the fields the button flow needs.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub callback_query: Option<CallbackQueryPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQueryPayload {
    pub id: String,
    #[serde(default)]
    pub data: String,
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    pub chat: ChatPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatPayload {
    pub id: i64,
}

/// A normalized trading signal.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub ticker: String,
    pub signal: String,
    pub price: f64,
    pub extra: String,
}

impl SignalEvent {
    /// Normalize an inbound payload: the direction token is uppercased.
    pub fn from_payload(payload: SignalPayload) -> Self {
        Self {
            ticker: payload.ticker,
            signal: payload.signal.to_uppercase(),
            price: payload.price,
            extra: payload.extra,
        }
    }
}

/// A button press relayed by Telegram.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub callback_id: String,
    pub chat_id: Option<i64>,
    pub data: String,
}

/// Webhook server state.
pub struct WebhookState {
    pub signal_tx: mpsc::Sender<SignalEvent>,
    pub callback_tx: mpsc::Sender<CallbackEvent>,
}

/// Start the webhook server.
pub async fn start_webhook_server(
    port: u16,
    signal_tx: mpsc::Sender<SignalEvent>,
    callback_tx: mpsc::Sender<CallbackEvent>,
) -> Result<(), String> {
    let state = Arc::new(WebhookState {
        signal_tx,
        callback_tx,
    });

    let app = Router::new()
        .route("/webhook", post(handle_signal))
        .route("/telegram", post(handle_telegram))
        .route("/health", get(health_check))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("🌐 Starting webhook server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind: {}", e))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn handle_signal(
    State(state): State<Arc<WebhookState>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    let payload: SignalPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(_) => {
            warn!("Rejected signal request without a usable JSON body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "msg": "No JSON"})),
            );
        }
    };

    let event = SignalEvent::from_payload(payload);
    info!(
        "📢 Signal received: {} {} @ {}",
        event.signal, event.ticker, event.price
    );

    if let Err(e) = state.signal_tx.send(event).await {
        warn!("Failed to queue signal event: {}", e);
    }

    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn handle_telegram(
    State(state): State<Arc<WebhookState>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    // Telegram expects a 200 for every update; anything we cannot use is
    // acknowledged and dropped.
    let update: TelegramUpdate = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(_) => return (StatusCode::OK, Json(json!({"status": "ok"}))),
    };

    if let Some(callback) = update.callback_query {
        let event = CallbackEvent {
            callback_id: callback.id,
            chat_id: callback.message.map(|m| m.chat.id),
            data: callback.data,
        };
        if let Err(e) = state.callback_tx.send(event).await {
            warn!("Failed to queue callback event: {}", e);
        }
    }

    (StatusCode::OK, Json(json!({"status": "ok"})))
}
