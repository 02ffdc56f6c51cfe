// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bitunix order client - signed reduce-only MARKET close orders.
//!
//! BITUNIX SIGNED REQUEST FLOW:
//!   1. Serialize the JSON order body
//!   2. Take the current Unix timestamp in milliseconds
//!   3. Sign `timestamp + method + path + body` with HMAC-SHA256 (hex)
//!   4. POST with BITUNIX-API-KEY / -TIMESTAMP / -SIGN headers
//!
//! Failures never propagate: the caller gets `success == false` and keeps
//! going, the tracked position is removed either way.

use anyhow::{Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use sha2::Sha256;
use tracing::{error, info};

type HmacSha256 = Hmac<Sha256>;

const ORDER_PATH: &str = "/api/v1/order";

#[derive(Serialize)]
struct CloseOrderRequest<'a> {
    symbol: &'a str,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    #[serde(rename = "reduceOnly")]
    reduce_only: bool,
}

/// Outcome of a close attempt.
#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub success: bool,
    pub raw: Option<serde_json::Value>,
}

pub struct BitunixClient {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl BitunixClient {
    pub fn new(api_key: &str, api_secret: &str, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("HTTP client build failed");
        Self {
            client,
            api_key: api_key.to_owned(),
            api_secret: api_secret.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Sign a prehash string with HMAC-SHA256.
    fn sign(&self, prehash: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.api_secret.as_bytes()).expect("HMAC key error");
        mac.update(prehash.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Close a position with a reduce-only MARKET order.
    ///
    /// `side` is the side that exits the tracked position: SELL for a
    /// stored LONG, BUY otherwise. A 2xx response counts as success only
    /// when its body carries a truthy `success` field.
    pub async fn close_position(&self, symbol: &str, side: &str) -> CloseOutcome {
        match self.try_close(symbol, side).await {
            Ok(raw) => {
                let success = raw.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
                if success {
                    info!("Close order accepted for {}", symbol);
                } else {
                    error!("Bitunix rejected close order for {}: {}", symbol, raw);
                }
                CloseOutcome {
                    success,
                    raw: Some(raw),
                }
            }
            Err(e) => {
                error!("Error executing close order on Bitunix: {:#}", e);
                CloseOutcome {
                    success: false,
                    raw: None,
                }
            }
        }
    }

    async fn try_close(&self, symbol: &str, side: &str) -> Result<serde_json::Value> {
        let body = serde_json::to_string(&CloseOrderRequest {
            symbol,
            side,
            order_type: "MARKET",
            reduce_only: true,
        })
        .context("Failed to serialize order body")?;

        let timestamp = Utc::now().timestamp_millis().to_string();
        let prehash = format!("{}POST{}{}", timestamp, ORDER_PATH, body);
        let signature = self.sign(&prehash);

        let url = format!("{}{}", self.base_url, ORDER_PATH);

        info!("Placing close order: {} {} @ MARKET (reduce-only)", side, symbol);

        let resp = self
            .client
            .post(&url)
            .header("BITUNIX-API-KEY", &self.api_key)
            .header("BITUNIX-API-TIMESTAMP", &timestamp)
            .header("BITUNIX-API-SIGN", &signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("HTTP POST to /api/v1/order failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            error!("HTTP {} — body: {}", status, text);
            anyhow::bail!("Close order failed: HTTP {}", status);
        }

        serde_json::from_str(&text).context("Failed to parse order response")
    }
}
