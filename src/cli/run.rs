// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{load_pipeline, OutputFormat, RunArgs};
use crate::branch::{EnvVariables, LayeredVariables, MapVariables};
use crate::pipeline::{
    ExecutionOptions, Pipeline, PipelineExecutor, PipelineValidator, RunReport, SchedulingStrategy,
    StepState,
};
use crate::sink::CsvDirectorySink;

/// Run the pipeline
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let pipeline = load_pipeline(&args.pipeline)?;

    // Validate pipeline
    let validation = PipelineValidator::validate(&pipeline)?;

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    if args.dry_run {
        return print_plan(&pipeline, args.format);
    }

    // Relative sources and the default output dir hang off the pipeline file
    let base_dir = pipeline_dir(&args.pipeline);
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| base_dir.join(&pipeline.output_dir));

    // --var beats the variables file beats the environment
    let mut variables = LayeredVariables::new().push(MapVariables::from_pairs(&args.vars)?);
    if let Some(path) = &args.variables {
        variables = variables.push(MapVariables::from_file(path)?);
    }
    let variables = variables.push(EnvVariables::new());

    let executor = PipelineExecutor::new(
        Arc::new(CsvDirectorySink::new(output_dir)),
        Arc::new(variables),
    );

    let options = ExecutionOptions {
        strategy: if args.sequential {
            SchedulingStrategy::Sequential
        } else {
            SchedulingStrategy::Parallel
        },
    };

    let report = executor.execute(&pipeline, &base_dir, &options).await?;

    match args.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report.to_json())
                .map_err(|e| miette::miette!("Failed to render report: {}", e))?
        ),
        OutputFormat::Text => print_report(&report, verbose),
    }

    if !report.is_success() {
        return Err(miette::miette!("Pipeline run failed"));
    }

    Ok(())
}

fn pipeline_dir(pipeline_path: &Path) -> PathBuf {
    match pipeline_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_plan(pipeline: &Pipeline, format: OutputFormat) -> Result<()> {
    let plan = PipelineExecutor::plan(pipeline)?;

    if format == OutputFormat::Json {
        let steps: Vec<serde_json::Value> = plan
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "transform": p.transform,
                    "group": p.group,
                    "depends_on": p.depends_on,
                    "branches": p.branches,
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "pipeline": pipeline.name, "plan": steps }));
        return Ok(());
    }

    println!("{} {}", "Execution plan for".bold(), pipeline.name.cyan());
    println!(
        "  Branch decided by {} on variable {}",
        pipeline.branching.decision_step.cyan(),
        pipeline.branching.variable.cyan()
    );
    println!();

    for (i, step) in plan.iter().enumerate() {
        let branches = if step.branches.is_empty() {
            String::new()
        } else {
            format!(" <branch: {}>", step.branches.join(", "))
        };
        let deps = if step.depends_on.is_empty() {
            String::new()
        } else {
            format!(" [depends: {}]", step.depends_on.join(", "))
        };
        println!(
            "  {}. {} ({}){}{}",
            i + 1,
            step.id,
            step.transform,
            branches.yellow(),
            deps.dimmed()
        );
    }

    Ok(())
}

fn print_report(report: &RunReport, verbose: bool) {
    println!("{} {}", "Pipeline".bold(), report.pipeline.cyan());

    if let Some(selection) = &report.selection {
        println!(
            "  Selected branch {} ({} matched {})",
            selection.branch.green().bold(),
            selection.value,
            selection.rule
        );
    }
    println!();

    for step in &report.steps {
        let timing = step
            .duration
            .filter(|_| verbose)
            .map(|d| format!(" {}ms", d.as_millis()))
            .unwrap_or_default();

        match &step.state {
            StepState::Completed => {
                println!("  {} {}{}", "✓".green(), step.id, timing.dimmed())
            }
            StepState::Failed { error } => {
                println!("  {} {}{}", "✗".red(), step.id, timing.dimmed());
                println!("      {}", format!("{}: {}", error.kind(), error).red());
            }
            StepState::Skipped { reason } => {
                println!("  {} {} {}", "-".dimmed(), step.id, format!("({})", reason).dimmed())
            }
            other => println!("  {} {} {}", "?".yellow(), step.id, other),
        }
    }

    if !report.artifacts.is_empty() {
        println!();
        println!("{}:", "Outputs".bold());
        for artifact in &report.artifacts {
            println!("  - {} ({} rows)", artifact.location, artifact.rows);
        }
    }

    println!();
    match &report.aborted_by {
        Some(step) => println!(
            "{}",
            format!("Run aborted: shared step '{}' failed", step).red().bold()
        ),
        None if report.is_success() => println!("{}", "Run completed.".green().bold()),
        None => println!("{}", "Run completed with failed steps.".red().bold()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_dir() {
        assert_eq!(pipeline_dir(Path::new(".branchflow.yaml")), PathBuf::from("."));
        assert_eq!(
            pipeline_dir(Path::new("demos/transactions/.branchflow.yaml")),
            PathBuf::from("demos/transactions")
        );
    }
}
