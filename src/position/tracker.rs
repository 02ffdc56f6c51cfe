// Copyright (C) 2025 Category Labs, Inc.
#![allow(dead_code)]
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position tracking for open trades.
//!
//! One logical position per instrument. A signal for an untracked
//! instrument proposes an open (human confirms via button); a signal
//! opposing a tracked position closes it automatically; a signal agreeing
//! with it is informational only.

use crate::store::JsonStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info};

/// Callback payload tag for the "open position" button.
const CALLBACK_TAG: &str = "abrir";

/// A tracked open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub instrument: String,
    pub direction: String,
    pub entry_price: f64,
    pub note: String,
}

/// A proposed open, carried entirely inside the button callback payload.
///
/// Nothing is stored server-side while the proposal waits for the operator:
/// the payload self-describes the position to register, so a stale or
/// duplicate press simply re-registers whatever the button encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenProposal {
    pub instrument: String,
    pub direction: String,
    pub entry_price: f64,
    pub note: String,
}

impl OpenProposal {
    /// Encode as `abrir|<instrument>|<direction>|<price>|<note>`.
    pub fn to_callback_data(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            CALLBACK_TAG, self.instrument, self.direction, self.entry_price, self.note
        )
    }

    /// Decode a button payload. The note is the last field, so it may
    /// itself contain the separator.
    pub fn from_callback_data(data: &str) -> Option<Self> {
        let mut parts = data.splitn(5, '|');
        if parts.next()? != CALLBACK_TAG {
            return None;
        }
        let instrument = parts.next()?.to_string();
        let direction = parts.next()?.to_string();
        let entry_price: f64 = parts.next()?.parse().ok()?;
        let note = parts.next().unwrap_or("").to_string();

        Some(Self {
            instrument,
            direction,
            entry_price,
            note,
        })
    }
}

/// What the tracker decided for an incoming signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalDecision {
    /// No tracked position: ask the operator to confirm an open.
    ProposeOpen,
    /// Tracked position in the same direction: notify only.
    AlreadyOpen,
    /// Tracked position in the opposing direction: it has been removed;
    /// the exchange close order still has to be placed.
    AutoClose {
        closed: OpenPosition,
        close_side: &'static str,
        pnl: f64,
    },
}

/// Manages the open-position and last-price maps.
#[derive(Debug)]
pub struct PositionTracker {
    positions: HashMap<String, OpenPosition>,
    last_prices: HashMap<String, f64>,
    positions_store: JsonStore,
    prices_store: JsonStore,
}

impl PositionTracker {
    /// Load both maps from their stores.
    pub fn load(positions_store: JsonStore, prices_store: JsonStore) -> Self {
        let positions = positions_store.load();
        let last_prices = prices_store.load();
        Self {
            positions,
            last_prices,
            positions_store,
            prices_store,
        }
    }

    /// Process an incoming signal and decide what to do with it.
    ///
    /// The last seen price is recorded and persisted first, whatever the
    /// decision. For an opposing signal the tracked record is removed and
    /// persisted here; the exchange outcome never blocks that removal.
    pub fn apply_signal(&mut self, instrument: &str, direction: &str, price: f64) -> SignalDecision {
        self.last_prices.insert(instrument.to_string(), price);
        if let Err(e) = self.prices_store.save(&self.last_prices) {
            error!("Failed to save last prices: {}", e);
        }

        let open = match self.positions.get(instrument) {
            None => return SignalDecision::ProposeOpen,
            Some(open) => open.clone(),
        };

        // Direction tokens compare verbatim: an unrecognized token is its
        // own direction.
        if open.direction == direction {
            return SignalDecision::AlreadyOpen;
        }

        self.positions.remove(instrument);
        if let Err(e) = self.positions_store.save(&self.positions) {
            error!("Failed to save positions: {}", e);
        }
        info!(
            "Auto-closing {} {} (entry {}, current {})",
            open.direction, instrument, open.entry_price, price
        );

        SignalDecision::AutoClose {
            close_side: close_side(&open.direction),
            pnl: informational_pnl(&open.direction, open.entry_price, price),
            closed: open,
        }
    }

    /// Register a confirmed open, overwriting any previous record.
    ///
    /// No validation against prior state: the last confirmation wins.
    pub fn confirm_open(&mut self, proposal: &OpenProposal) -> OpenPosition {
        let position = OpenPosition {
            instrument: proposal.instrument.clone(),
            direction: proposal.direction.clone(),
            entry_price: proposal.entry_price,
            note: proposal.note.clone(),
        };

        info!(
            "Registering position: {} {} @ {}",
            position.direction, position.instrument, position.entry_price
        );
        self.positions
            .insert(position.instrument.clone(), position.clone());
        if let Err(e) = self.positions_store.save(&self.positions) {
            error!("Failed to save positions: {}", e);
        }
        position
    }

    /// Save both maps (used on shutdown).
    pub fn save(&self) -> Result<(), String> {
        self.positions_store.save(&self.positions)?;
        self.prices_store.save(&self.last_prices)?;
        Ok(())
    }

    /// Get a tracked position.
    pub fn get(&self, instrument: &str) -> Option<&OpenPosition> {
        self.positions.get(instrument)
    }

    /// Last price seen for an instrument.
    pub fn last_price(&self, instrument: &str) -> Option<f64> {
        self.last_prices.get(instrument).copied()
    }

    /// Number of tracked open positions.
    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of instruments with a recorded price.
    pub fn price_count(&self) -> usize {
        self.last_prices.len()
    }
}

/// Order side that exits a position opened in `direction`.
fn close_side(direction: &str) -> &'static str {
    if direction == "LONG" {
        "SELL"
    } else {
        "BUY"
    }
}

/// Informational PnL: no quantity is tracked, only the price move.
fn informational_pnl(direction: &str, entry_price: f64, current_price: f64) -> f64 {
    if direction == "LONG" {
        current_price - entry_price
    } else {
        entry_price - current_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_tracker(name: &str) -> PositionTracker {
        let dir = std::env::temp_dir();
        let pid = std::process::id();
        let positions = dir.join(format!("tv-relay-positions-{}-{}.json", name, pid));
        let prices = dir.join(format!("tv-relay-prices-{}-{}.json", name, pid));
        let _ = std::fs::remove_file(&positions);
        let _ = std::fs::remove_file(&prices);
        PositionTracker::load(JsonStore::new(positions), JsonStore::new(prices))
    }

    fn proposal(instrument: &str, direction: &str, price: f64) -> OpenProposal {
        OpenProposal {
            instrument: instrument.to_string(),
            direction: direction.to_string(),
            entry_price: price,
            note: String::new(),
        }
    }

    #[test]
    fn untracked_instrument_proposes_open_without_mutation() {
        let mut tracker = temp_tracker("propose");
        let decision = tracker.apply_signal("BTCUSDT", "LONG", 50000.0);

        assert_eq!(decision, SignalDecision::ProposeOpen);
        assert_eq!(tracker.open_count(), 0);
        assert_eq!(tracker.last_price("BTCUSDT"), Some(50000.0));
    }

    #[test]
    fn same_direction_leaves_position_untouched() {
        let mut tracker = temp_tracker("same-direction");
        tracker.confirm_open(&proposal("BTCUSDT", "LONG", 50000.0));

        let decision = tracker.apply_signal("BTCUSDT", "LONG", 52000.0);

        assert_eq!(decision, SignalDecision::AlreadyOpen);
        assert_eq!(tracker.get("BTCUSDT").unwrap().entry_price, 50000.0);
        assert_eq!(tracker.last_price("BTCUSDT"), Some(52000.0));
    }

    #[test]
    fn opposing_signal_closes_and_persists_removal() {
        let mut tracker = temp_tracker("auto-close");
        tracker.confirm_open(&proposal("BTCUSDT", "LONG", 50000.0));

        let decision = tracker.apply_signal("BTCUSDT", "SHORT", 51000.0);

        match decision {
            SignalDecision::AutoClose {
                closed,
                close_side,
                pnl,
            } => {
                assert_eq!(closed.direction, "LONG");
                assert_eq!(close_side, "SELL");
                assert_eq!(pnl, 1000.0);
            }
            other => panic!("expected AutoClose, got {:?}", other),
        }
        assert!(tracker.get("BTCUSDT").is_none());

        // Removal must have hit the file too.
        let reloaded = PositionTracker::load(
            tracker.positions_store.clone(),
            tracker.prices_store.clone(),
        );
        assert_eq!(reloaded.open_count(), 0);
        assert_eq!(reloaded.last_price("BTCUSDT"), Some(51000.0));
    }

    #[test]
    fn short_position_closes_with_buy_side() {
        let mut tracker = temp_tracker("short-close");
        tracker.confirm_open(&proposal("ETHUSDT", "SHORT", 100.0));

        match tracker.apply_signal("ETHUSDT", "LONG", 90.0) {
            SignalDecision::AutoClose {
                close_side, pnl, ..
            } => {
                assert_eq!(close_side, "BUY");
                assert_eq!(pnl, 10.0);
                assert!(pnl > 0.0);
            }
            other => panic!("expected AutoClose, got {:?}", other),
        }
    }

    #[test]
    fn pnl_sign_matrix() {
        assert_eq!(informational_pnl("LONG", 100.0, 110.0), 10.0);
        assert_eq!(informational_pnl("LONG", 100.0, 90.0), -10.0);
        assert_eq!(informational_pnl("SHORT", 100.0, 90.0), 10.0);
        // Exactly zero is reported as a loss, not a gain.
        assert!(!(informational_pnl("LONG", 100.0, 100.0) > 0.0));
    }

    #[test]
    fn unrecognized_direction_is_its_own_direction() {
        let mut tracker = temp_tracker("weird-token");
        tracker.confirm_open(&proposal("DOGEUSDT", "SIDEWAYS", 1.0));

        // Equal unrecognized tokens count as the same direction.
        assert_eq!(
            tracker.apply_signal("DOGEUSDT", "SIDEWAYS", 2.0),
            SignalDecision::AlreadyOpen
        );

        // A differing token opposes it; anything stored other than LONG
        // closes with a BUY.
        match tracker.apply_signal("DOGEUSDT", "LONG", 2.0) {
            SignalDecision::AutoClose {
                close_side, pnl, ..
            } => {
                assert_eq!(close_side, "BUY");
                assert_eq!(pnl, -1.0);
            }
            other => panic!("expected AutoClose, got {:?}", other),
        }
    }

    #[test]
    fn confirm_open_is_idempotent() {
        let mut tracker = temp_tracker("idempotent");
        let p = proposal("BTCUSDT", "LONG", 50000.0);

        let first = tracker.confirm_open(&p);
        let second = tracker.confirm_open(&p);

        assert_eq!(first, second);
        assert_eq!(tracker.open_count(), 1);
        assert_eq!(tracker.get("BTCUSDT"), Some(&second));
    }

    #[test]
    fn last_confirmation_wins() {
        let mut tracker = temp_tracker("overwrite");
        tracker.confirm_open(&proposal("BTCUSDT", "LONG", 50000.0));
        tracker.confirm_open(&proposal("BTCUSDT", "SHORT", 51000.0));

        let stored = tracker.get("BTCUSDT").unwrap();
        assert_eq!(stored.direction, "SHORT");
        assert_eq!(stored.entry_price, 51000.0);
        assert_eq!(tracker.open_count(), 1);
    }

    #[test]
    fn proposal_round_trip() {
        let p = OpenProposal {
            instrument: "BTCUSDT".to_string(),
            direction: "LONG".to_string(),
            entry_price: 50000.0,
            note: "cruce de medias 📈".to_string(),
        };
        let decoded = OpenProposal::from_callback_data(&p.to_callback_data()).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn proposal_note_may_contain_separator() {
        let p = OpenProposal {
            instrument: "ETHUSDT".to_string(),
            direction: "SHORT".to_string(),
            entry_price: 1800.5,
            note: "RSI|MACD combinados".to_string(),
        };
        let decoded = OpenProposal::from_callback_data(&p.to_callback_data()).unwrap();
        assert_eq!(decoded.note, "RSI|MACD combinados");
        assert_eq!(decoded, p);
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(OpenProposal::from_callback_data("").is_none());
        assert!(OpenProposal::from_callback_data("cerrar|BTCUSDT|LONG|1|x").is_none());
        assert!(OpenProposal::from_callback_data("abrir|BTCUSDT|LONG|not-a-price|x").is_none());
        assert!(OpenProposal::from_callback_data("abrir|BTCUSDT|LONG").is_none());
    }

    #[test]
    fn full_cycle_long_then_opposing_short() {
        let mut tracker = temp_tracker("full-cycle");

        // Signal with no prior state: proposal only, nothing tracked.
        assert_eq!(
            tracker.apply_signal("BTC", "LONG", 50000.0),
            SignalDecision::ProposeOpen
        );
        assert_eq!(tracker.open_count(), 0);

        // Operator presses the button.
        tracker.confirm_open(&proposal("BTC", "LONG", 50000.0));
        assert_eq!(tracker.get("BTC").unwrap().direction, "LONG");

        // Opposing signal arrives: auto-close with a gain.
        match tracker.apply_signal("BTC", "SHORT", 51000.0) {
            SignalDecision::AutoClose {
                closed,
                close_side,
                pnl,
            } => {
                assert_eq!(closed.entry_price, 50000.0);
                assert_eq!(close_side, "SELL");
                assert_eq!(pnl, 1000.0);
                assert!(pnl > 0.0);
            }
            other => panic!("expected AutoClose, got {:?}", other),
        }
        assert_eq!(tracker.open_count(), 0);
    }
}
