// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Intermediate result store
//!
//! Per-run map from step id to the dataset that step produced. A fresh store
//! is created for every run and shared with step tasks through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::errors::{PipelineError, PipelineResult};

/// A stored dataset snapshot and the step that wrote it
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub dataset: Arc<Dataset>,
    pub producer: String,
}

/// Per-run key/value store of intermediate datasets
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: RwLock<HashMap<String, StoreEntry>>,
}

impl ResultStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `dataset` under `key`, replacing any earlier entry
    pub async fn put(&self, key: &str, dataset: Dataset, producer: &str) {
        let entry = StoreEntry {
            dataset: Arc::new(dataset),
            producer: producer.to_string(),
        };
        let rows = entry.dataset.len();

        let previous = self.entries.write().await.insert(key.to_string(), entry);
        match previous {
            Some(old) => warn!(
                key,
                producer,
                previous_producer = %old.producer,
                "overwriting existing store entry"
            ),
            None => debug!(key, producer, rows, "stored dataset"),
        }
    }

    /// Dataset stored under `key`
    pub async fn get(&self, key: &str) -> PipelineResult<Arc<Dataset>> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| Arc::clone(&entry.dataset))
            .ok_or_else(|| PipelineError::KeyNotFound {
                key: key.to_string(),
            })
    }

    /// Step that produced the entry under `key`
    pub async fn producer(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| entry.producer.clone())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
