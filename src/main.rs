// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! TradingView-to-Telegram relay with human-confirmed opens and
//! automatic Bitunix closes on opposing signals.

mod config;
mod exchange;
mod position;
mod store;
mod telegram;
mod webhook;

use config::Config;
use exchange::BitunixClient;
use position::{OpenProposal, PositionTracker, SignalDecision};
use store::JsonStore;
use telegram::TelegramNotifier;
use webhook::{CallbackEvent, SignalEvent};

use teloxide::types::ChatId;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const POSITIONS_FILE: &str = "positions.json";
const PRICES_FILE: &str = "last_prices.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Signal relay bot starting...");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load config: {}", e);
        e
    })?;

    info!("🌐 Listen port: {}", config.port);
    info!("🏦 Bitunix endpoint: {}", config.bitunix_base_url);

    // Load tracked state from disk
    let mut tracker =
        PositionTracker::load(JsonStore::new(POSITIONS_FILE), JsonStore::new(PRICES_FILE));
    info!(
        "📊 Loaded {} open positions, {} price marks",
        tracker.open_count(),
        tracker.price_count()
    );

    // Initialize Telegram notifier and exchange client
    let telegram = TelegramNotifier::new(config.telegram_token.clone(), config.chat_id.clone());
    let exchange = BitunixClient::new(
        &config.bitunix_api_key,
        &config.bitunix_api_secret,
        &config.bitunix_base_url,
    );

    // Create channels
    let (signal_tx, mut signal_rx) = mpsc::channel::<SignalEvent>(100);
    let (callback_tx, mut callback_rx) = mpsc::channel::<CallbackEvent>(100);

    // Start the webhook server
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = webhook::start_webhook_server(port, signal_tx, callback_tx).await {
            error!("❌ Webhook server error: {}", e);
        }
    });

    telegram.send_message("🚀 Bot de señales en marcha").await;

    info!("✅ Relay ready! Waiting for signals...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Main event loop with graceful shutdown. One event runs to completion
    // at a time, so the tracker needs no locking.
    loop {
        tokio::select! {
            // Handle shutdown signal
            _ = signal::ctrl_c() => {
                info!("🛑 Shutdown signal received, saving state...");
                if let Err(e) = tracker.save() {
                    error!("❌ Failed to save state: {}", e);
                } else {
                    info!("✅ State saved ({} open positions)", tracker.open_count());
                }
                telegram.send_message("🛑 Bot detenido").await;
                break;
            }

            // Handle incoming trading signals
            Some(event) = signal_rx.recv() => {
                handle_signal(event, &mut tracker, &telegram, &exchange).await;
            }

            // Handle Telegram button presses
            Some(event) = callback_rx.recv() => {
                handle_callback(event, &mut tracker, &telegram).await;
            }
        }
    }

    Ok(())
}

/// Process one inbound signal to completion.
async fn handle_signal(
    event: SignalEvent,
    tracker: &mut PositionTracker,
    telegram: &TelegramNotifier,
    exchange: &BitunixClient,
) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mensaje = format!(
        "📢 Señal detectada\n🪙 <b>{}</b>\n📈 Señal: <b>{}</b>\n{}",
        event.ticker, event.signal, event.extra
    );

    match tracker.apply_signal(&event.ticker, &event.signal, event.price) {
        SignalDecision::ProposeOpen => {
            // Nothing tracked yet: the button payload carries the whole
            // proposal, nothing is stored until the operator confirms.
            let proposal = OpenProposal {
                instrument: event.ticker.clone(),
                direction: event.signal.clone(),
                entry_price: event.price,
                note: event.extra.clone(),
            };
            let button_label = format!("/abrir {} {}", event.ticker, event.signal);
            telegram
                .send_message_with_button(&mensaje, &button_label, &proposal.to_callback_data())
                .await;
        }

        SignalDecision::AlreadyOpen => {
            telegram.send_message(&mensaje).await;
        }

        SignalDecision::AutoClose {
            closed,
            close_side,
            pnl,
        } => {
            let result = exchange.close_position(&event.ticker, close_side).await;

            let (color, estado) = if pnl > 0.0 {
                ("🟢", "GANANCIA")
            } else {
                ("🔴", "PÉRDIDA")
            };
            telegram
                .send_message(&format!(
                    "{} <b>OPERACIÓN CERRADA AUTOMÁTICAMENTE</b>\n\
                     🪙 <b>{}</b>\n\
                     Tipo: <b>{}</b>\n\
                     Precio entrada: <b>{}</b>\n\
                     Precio cierre: <b>{}</b>\n\
                     <b>{}</b> PnL: <b>{:.4}</b>",
                    color, event.ticker, closed.direction, closed.entry_price, event.price, estado, pnl
                ))
                .await;

            if result.success {
                telegram
                    .send_message(&format!(
                        "🔄 Orden de cierre ejecutada en Bitunix para {}",
                        event.ticker
                    ))
                    .await;
            } else {
                telegram
                    .send_message(&format!(
                        "⚠️ Error cerrando operación en Bitunix para {}",
                        event.ticker
                    ))
                    .await;
            }
        }
    }
}

/// Process one Telegram button press.
async fn handle_callback(
    event: CallbackEvent,
    tracker: &mut PositionTracker,
    telegram: &TelegramNotifier,
) {
    if let Some(proposal) = OpenProposal::from_callback_data(&event.data) {
        let position = tracker.confirm_open(&proposal);

        let confirmation = format!(
            "✅ Operación registrada:\n🪙 <b>{}</b>\nTipo: <b>{}</b>\nPrecio entrada: <b>{}</b>\n{}",
            position.instrument, position.direction, position.entry_price, position.note
        );
        match event.chat_id {
            Some(chat) => telegram.send_message_to(ChatId(chat), &confirmation).await,
            None => telegram.send_message(&confirmation).await,
        }
    }

    // Answer even for payloads we ignored, so the client spinner clears.
    telegram.answer_callback(event.callback_id).await;
}
