// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Graph command - visualize pipeline as a graph

use miette::Result;
use std::path::PathBuf;

use super::{load_pipeline, GraphFormat};
use crate::pipeline::DagBuilder;

/// Run the graph command
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    let pipeline = load_pipeline(&pipeline_path)?;

    // Build DAG
    let dag = DagBuilder::build(&pipeline)?;

    // Output in requested format
    let output = match format {
        GraphFormat::Text => dag.to_text(&pipeline)?,
        GraphFormat::Dot => dag.to_dot(&pipeline),
        GraphFormat::Mermaid => dag.to_mermaid(&pipeline)?,
    };

    println!("{}", output);

    Ok(())
}
