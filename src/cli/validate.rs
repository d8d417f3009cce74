// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::load_pipeline;
use crate::pipeline::PipelineValidator;

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let pipeline = match load_pipeline(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("  {} Failed to parse pipeline", "✗".red());
            eprintln!();
            return Err(e);
        }
    };

    println!("  {} Pipeline file parsed", "✓".green());

    // Validate pipeline structure
    let validation = PipelineValidator::validate(&pipeline)?;

    // Sources are relative to the pipeline file
    let base = match pipeline_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let missing_files = PipelineValidator::validate_files(&pipeline, &base)?;

    // Report results
    let mut has_issues = false;

    if !validation.errors.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !missing_files.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Missing files".yellow().bold());
        for missing in &missing_files {
            println!("  {} {}", "⚠".yellow(), missing);
        }
    }

    if !validation.warnings.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Steps: {}", pipeline.steps.len());
        for (group, steps) in pipeline.groups() {
            let label = if group.is_empty() { "(ungrouped)" } else { group };
            println!("    {}: {}", label, steps.join(", "));
        }
        println!(
            "  Branches: {}",
            pipeline
                .branching
                .branches
                .iter()
                .map(|b| format!("{} -> {}", b.id, b.entry))
                .collect::<Vec<_>>()
                .join(", ")
        );
        for rule in &pipeline.branching.rules {
            println!("    {}", rule.to_string().dimmed());
        }
    }

    println!();

    if has_issues {
        if validation.is_valid() && missing_files.is_empty() {
            println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
            Ok(())
        } else {
            Err(miette::miette!("Pipeline validation failed"))
        }
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
