// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Variable stores
//!
//! Where the branching variable comes from. The CLI layers explicit `--var`
//! pairs over a variables file over the environment.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::{PipelineError, PipelineResult};

/// Environment variable prefix for pipeline variables
pub const ENV_PREFIX: &str = "BRANCHFLOW_VAR_";

/// Read-only source of string variables
pub trait VariableStore: Send + Sync {
    /// Value of `name`, `None` when unset
    fn get(&self, name: &str) -> Option<String>;
}

/// Variables read from `BRANCHFLOW_VAR_<NAME>` environment variables
#[derive(Debug, Clone)]
pub struct EnvVariables {
    prefix: String,
}

impl EnvVariables {
    pub fn new() -> Self {
        Self::with_prefix(ENV_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for EnvVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore for EnvVariables {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}{}", self.prefix, name.to_uppercase())).ok()
    }
}

/// In-memory variables
#[derive(Debug, Clone, Default)]
pub struct MapVariables {
    values: HashMap<String, String>,
}

impl MapVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Parse `NAME=VALUE` pairs
    pub fn from_pairs(pairs: &[String]) -> PipelineResult<Self> {
        let mut values = HashMap::new();
        for pair in pairs {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                PipelineError::InvalidPipeline {
                    reason: format!("variable '{}' is not in NAME=VALUE form", pair),
                    help: Some("Example: --var transform_action=filter_by_location".into()),
                }
            })?;
            values.insert(name.trim().to_string(), value.to_string());
        }
        Ok(Self { values })
    }

    /// Load a flat string map from a YAML, JSON or TOML file
    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        let values: HashMap<String, String> =
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => serde_json::from_str(&content)?,
                Some("toml") => toml::from_str(&content)?,
                _ => serde_yaml::from_str(&content)?,
            };

        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl VariableStore for MapVariables {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// First store holding a value wins
#[derive(Default)]
pub struct LayeredVariables {
    layers: Vec<Box<dyn VariableStore>>,
}

impl LayeredVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with lower priority than the existing ones
    pub fn push(mut self, layer: impl VariableStore + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }
}

impl VariableStore for LayeredVariables {
    fn get(&self, name: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }
}
