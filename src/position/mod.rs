// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position management module.

pub mod tracker;

pub use tracker::{OpenPosition, OpenProposal, PositionTracker, SignalDecision};
