// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Artifact sinks
//!
//! Terminal steps hand their dataset to a sink instead of the result store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;

use crate::dataset::{write_csv_string, Dataset};
use crate::errors::{PipelineError, PipelineResult};

/// Trait for artifact destinations
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Write `dataset` as artifact `name`, returning where it went
    async fn write(&self, name: &str, dataset: &Dataset) -> PipelineResult<String>;
}

/// Writes `<dir>/<name>.csv` files
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    dir: PathBuf,
    /// File name template, `{name}` is replaced by the artifact name
    template: String,
}

impl CsvDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            template: "{name}.csv".to_string(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Path an artifact named `name` is written to
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(self.template.replace("{name}", name))
    }
}

#[async_trait]
impl ArtifactSink for CsvDirectorySink {
    async fn write(&self, name: &str, dataset: &Dataset) -> PipelineResult<String> {
        let path = self.path_for(name);
        let write_error = |e: std::io::Error| PipelineError::SinkWriteError {
            path: path.clone(),
            error: e.to_string(),
        };

        let content = write_csv_string(dataset)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_error)?;
        tokio::fs::write(&path, content).await.map_err(write_error)?;

        info!(artifact = name, path = %path.display(), rows = dataset.len(), "wrote artifact");
        Ok(path.display().to_string())
    }
}

/// Keeps artifacts in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<HashMap<String, Dataset>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact written under `name`
    pub async fn get(&self, name: &str) -> Option<Dataset> {
        self.artifacts.lock().await.get(name).cloned()
    }

    /// Names of written artifacts, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.artifacts.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write(&self, name: &str, dataset: &Dataset) -> PipelineResult<String> {
        self.artifacts
            .lock()
            .await
            .insert(name.to_string(), dataset.clone());
        Ok(format!("memory://{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::read_csv_str;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_csv_directory_sink_creates_dir() {
        let temp = TempDir::new().unwrap();
        let sink = CsvDirectorySink::new(temp.path().join("output"));
        let ds = read_csv_str("loc,amt\nSan Diego,10\n").unwrap();

        let location = sink.write("filter_by_location", &ds).await.unwrap();

        let path = temp.path().join("output").join("filter_by_location.csv");
        assert_eq!(location, path.display().to_string());
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "loc,amt\nSan Diego,10\n"
        );
    }

    #[tokio::test]
    async fn test_template() {
        let sink = CsvDirectorySink::new("out").with_template("run-{name}.csv");
        assert_eq!(sink.path_for("x"), PathBuf::from("out/run-x.csv"));
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        let ds = read_csv_str("a\n1\n").unwrap();

        assert_eq!(sink.write("a", &ds).await.unwrap(), "memory://a");
        assert_eq!(sink.get("a").await, Some(ds));
        assert_eq!(sink.names().await, vec!["a"]);
    }
}
