// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! JSON file persistence for the tracker maps.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// A string-keyed map persisted as a single JSON document.
///
/// Each mutation is a full-file overwrite; the tracker event loop is the
/// only writer.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the map from file.
    ///
    /// A missing file is not an error: it yields an empty map.
    pub fn load<T: DeserializeOwned>(&self) -> HashMap<String, T> {
        if !self.path.exists() {
            info!("No file at {}, starting fresh", self.path.display());
            return HashMap::new();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, T>>(&content) {
                Ok(map) => {
                    info!("Loaded {} entries from {}", map.len(), self.path.display());
                    map
                }
                Err(e) => {
                    error!("Failed to parse {}: {}", self.path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) => {
                error!("Failed to read {}: {}", self.path.display(), e);
                HashMap::new()
            }
        }
    }

    /// Save the map to file, replacing any previous contents.
    pub fn save<T: Serialize>(&self, map: &HashMap<String, T>) -> Result<(), String> {
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| format!("Failed to serialize {}: {}", self.path.display(), e))?;

        fs::write(&self.path, content)
            .map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))?;

        debug!("Saved {} entries to {}", map.len(), self.path.display());
        Ok(())
    }
}
