// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! Branch selection
//!
//! The branching variable is classified against a statically declared rule
//! table. Rules are tried in declaration order and the first match picks the
//! branch. A value no rule matches is an error, never an empty run.

mod variables;

pub use variables::{EnvVariables, LayeredVariables, MapVariables, VariableStore, ENV_PREFIX};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::errors::{PipelineError, PipelineResult};

/// How a rule matches the branching value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPattern {
    /// Value starts with the tag
    Prefix(String),
    /// Value equals the tag
    Exact(String),
    /// Value matches the regular expression
    Regex(String),
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(tag) => write!(f, "prefix '{}'", tag),
            Self::Exact(tag) => write!(f, "exact '{}'", tag),
            Self::Regex(re) => write!(f, "regex '{}'", re),
        }
    }
}

/// One row of the branch table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRule {
    #[serde(flatten)]
    pub pattern: MatchPattern,

    /// Branch selected when the pattern matches
    pub branch: String,
}

impl fmt::Display for BranchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pattern, self.branch)
    }
}

/// Outcome of a successful selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Selected branch id
    pub branch: String,
    /// Raw variable value
    pub value: String,
    /// Rule that matched, rendered for reports
    pub rule: String,
    /// Text after the tag for prefix matches
    pub remainder: Option<String>,
}

struct CompiledRule {
    rule: BranchRule,
    regex: Option<Regex>,
}

impl CompiledRule {
    /// Remainder of the value on a match (empty for exact and regex rules)
    fn matches<'v>(&self, value: &'v str) -> Option<&'v str> {
        match &self.rule.pattern {
            MatchPattern::Prefix(tag) => value.strip_prefix(tag.as_str()),
            MatchPattern::Exact(tag) => (value == tag).then_some(""),
            MatchPattern::Regex(_) => self
                .regex
                .as_ref()
                .filter(|re| re.is_match(value))
                .map(|_| ""),
        }
    }
}

/// Maps the branching variable to exactly one branch
pub struct BranchSelector {
    variable: String,
    rules: Vec<CompiledRule>,
}

impl BranchSelector {
    /// Build a selector, checking that every rule targets a declared branch
    pub fn new(
        variable: impl Into<String>,
        rules: &[BranchRule],
        branches: &[&str],
    ) -> PipelineResult<Self> {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if !branches.contains(&rule.branch.as_str()) {
                return Err(PipelineError::InvalidBranching {
                    reason: format!("rule '{}' targets undeclared branch '{}'", rule, rule.branch),
                });
            }

            let regex = match &rule.pattern {
                MatchPattern::Regex(re) => {
                    Some(Regex::new(re).map_err(|e| PipelineError::InvalidBranching {
                        reason: format!("invalid regex '{}': {}", re, e),
                    })?)
                }
                _ => None,
            };

            compiled.push(CompiledRule {
                rule: rule.clone(),
                regex,
            });
        }

        Ok(Self {
            variable: variable.into(),
            rules: compiled,
        })
    }

    /// Name of the variable this selector reads
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Classify `value`; a missing value is an error, not an empty string
    pub fn select(&self, value: Option<&str>) -> PipelineResult<Selection> {
        let value = value.ok_or_else(|| PipelineError::VariableMissing {
            variable: self.variable.clone(),
        })?;

        for compiled in &self.rules {
            if let Some(remainder) = compiled.matches(value) {
                let selection = Selection {
                    branch: compiled.rule.branch.clone(),
                    value: value.to_string(),
                    rule: compiled.rule.pattern.to_string(),
                    remainder: (!remainder.is_empty()).then(|| remainder.to_string()),
                };
                info!(
                    variable = %self.variable,
                    value,
                    branch = %selection.branch,
                    rule = %selection.rule,
                    "branch selected"
                );
                return Ok(selection);
            }
        }

        let rules: Vec<String> = self.rules.iter().map(|c| c.rule.to_string()).collect();
        Err(PipelineError::no_matching_branch(&self.variable, value, &rules))
    }

    /// Read the variable from `variables` and classify it
    pub fn select_from(&self, variables: &dyn VariableStore) -> PipelineResult<Selection> {
        let value = variables.get(&self.variable);
        self.select(value.as_deref())
    }
}
