// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for branchflow.

pub mod graph;
pub mod init;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::DEFAULT_PIPELINE_FILE;

/// Branching data pipeline runner
///
/// Ingest, clean, then run exactly one of several transform branches.
#[derive(Parser, Debug)]
#[clap(
    name = "branchflow",
    version,
    about = "Run branching CSV pipelines",
    long_about = None,
    after_help = "Examples:\n\
        branchflow init                                  Write a sample pipeline\n\
        branchflow run --var transform_action=filter     Run the filtering branch\n\
        branchflow graph --format mermaid                Show the pipeline graph\n\n\
        See 'branchflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a sample pipeline to the current directory
    Init {
        /// Overwrite an existing pipeline file
        #[clap(short, long)]
        force: bool,
    },

    /// Run the pipeline
    Run(RunArgs),

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = DEFAULT_PIPELINE_FILE)]
        pipeline: PathBuf,
    },

    /// Show pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE_FILE)]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },
}

/// Arguments of the run command
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Pipeline file
    #[clap(short, long, default_value = DEFAULT_PIPELINE_FILE)]
    pub pipeline: PathBuf,

    /// Set a variable, e.g. --var transform_action=filter
    #[clap(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Read variables from a YAML, JSON or TOML file
    #[clap(long, value_name = "FILE")]
    pub variables: Option<PathBuf>,

    /// Write artifacts here instead of the pipeline's output_dir
    #[clap(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Run one step at a time
    #[clap(long)]
    pub sequential: bool,

    /// Dry run (show what would be done)
    #[clap(long)]
    pub dry_run: bool,

    /// Report format
    #[clap(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

/// Load a pipeline file, pointing at `init` when it is missing
pub(crate) fn load_pipeline(path: &std::path::Path) -> miette::Result<crate::pipeline::Pipeline> {
    if !path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}\n\n\
             Run 'branchflow init' to create a sample pipeline.",
            path.display()
        ));
    }

    crate::pipeline::Pipeline::from_file(path)
        .map_err(|e| miette::miette!("Failed to load pipeline: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "branchflow",
            "run",
            "--var",
            "transform_action=filter",
            "--sequential",
            "--format",
            "json",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.vars, vec!["transform_action=filter"]);
                assert!(args.sequential);
                assert_eq!(args.format, OutputFormat::Json);
                assert_eq!(args.pipeline, PathBuf::from(DEFAULT_PIPELINE_FILE));
            }
            other => panic!("Expected run command, got {:?}", other),
        }
    }
}
