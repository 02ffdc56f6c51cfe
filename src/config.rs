// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration module - loads settings from environment variables.

/// Main configuration for the relay bot.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub chat_id: Option<String>,

    // Bitunix
    pub bitunix_api_key: String,
    pub bitunix_api_secret: String,
    pub bitunix_base_url: String,

    // HTTP server
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `TELEGRAM_TOKEN`, `BITUNIX_API_KEY` and `BITUNIX_API_SECRET` are
    /// mandatory; the bot refuses to start without them.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Telegram
            telegram_token: env_var("TELEGRAM_TOKEN")?,
            chat_id: std::env::var("CHAT_ID").ok(),

            // Bitunix
            bitunix_api_key: env_var("BITUNIX_API_KEY")?,
            bitunix_api_secret: env_var("BITUNIX_API_SECRET")?,
            bitunix_base_url: env_var_or("BITUNIX_BASE_URL", "https://api.bitunix.com"),

            // HTTP server
            port: env_var_or("PORT", "5000").parse().unwrap_or(5000),
        })
    }
}

fn env_var(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{} not set", name))
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
