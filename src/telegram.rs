// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Telegram notifier module.
//!
//! Send failures are logged and swallowed: a broken Telegram call must
//! never block a tracker state transition.

use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    default_chat: Option<ChatId>,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: Option<String>) -> Self {
        info!(
            "📱 Initializing Telegram: chat_id={}",
            chat_id.as_deref().unwrap_or("NONE")
        );

        let default_chat = chat_id.and_then(|id| id.parse::<i64>().ok()).map(ChatId);
        if default_chat.is_none() {
            warn!("CHAT_ID missing or invalid, default-chat messages will be dropped");
        }

        Self {
            bot: Bot::new(token),
            default_chat,
        }
    }

    /// Send a message to the default chat.
    pub async fn send_message(&self, text: &str) {
        match self.default_chat {
            Some(chat) => self.send_message_to(chat, text).await,
            None => warn!("No default chat configured, dropping message"),
        }
    }

    /// Send a message to an explicit chat (HTML parse mode).
    pub async fn send_message_to(&self, chat: ChatId, text: &str) {
        let result = self
            .bot
            .send_message(chat, text)
            .parse_mode(ParseMode::Html)
            .await;
        match result {
            Ok(_) => info!("📤 Sent Telegram message"),
            Err(e) => error!("Failed to send Telegram message: {}", e),
        }
    }

    /// Send a message to the default chat with one inline callback button.
    ///
    /// The payload string comes back verbatim when the operator presses
    /// the button.
    pub async fn send_message_with_button(
        &self,
        text: &str,
        button_label: &str,
        callback_data: &str,
    ) {
        let chat = match self.default_chat {
            Some(chat) => chat,
            None => {
                warn!("No default chat configured, dropping button message");
                return;
            }
        };

        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            button_label.to_string(),
            callback_data.to_string(),
        )]]);

        let result = self
            .bot
            .send_message(chat, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await;
        match result {
            Ok(_) => info!("📤 Sent Telegram message with button"),
            Err(e) => error!("Failed to send Telegram message: {}", e),
        }
    }

    /// Acknowledge a button press so the client stops showing its spinner.
    pub async fn answer_callback(&self, callback_id: String) {
        if let Err(e) = self
            .bot
            .answer_callback_query(teloxide::types::CallbackQueryId(callback_id))
            .await
        {
            error!("Failed to answer callback query: {}", e);
        }
    }
}
