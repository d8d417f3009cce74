// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 branchflow contributors

//! DAG (Directed Acyclic Graph) builder for pipeline dependencies
//!
//! Builds and validates dependency graphs for pipeline steps, ensuring proper
//! execution order and detecting cycles. Also answers the reachability
//! questions branch pruning needs.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::errors::PipelineError;
use crate::pipeline::Pipeline;

/// Builder for step dependency DAGs
pub struct DagBuilder {
    graph: DiGraph<usize, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    index_to_name: HashMap<NodeIndex, String>,
}

impl DagBuilder {
    /// Create a new DAG builder
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_index: HashMap::new(),
            index_to_name: HashMap::new(),
        }
    }

    /// Build a DAG from a pipeline
    pub fn build(pipeline: &Pipeline) -> Result<Self, PipelineError> {
        let mut builder = Self::new();

        // Add all steps as nodes
        for (idx, step) in pipeline.steps.iter().enumerate() {
            if builder.name_to_index.contains_key(&step.id) {
                return Err(PipelineError::DuplicateStep {
                    step: step.id.clone(),
                });
            }
            let node = builder.graph.add_node(idx);
            builder.name_to_index.insert(step.id.clone(), node);
            builder.index_to_name.insert(node, step.id.clone());
        }

        // Explicit dependencies plus the implicit one from `input`
        for step in &pipeline.steps {
            let step_node = builder.name_to_index[&step.id];

            for dep_name in step.depends_on.iter().chain(step.input.iter()) {
                let dep_node = builder.name_to_index.get(dep_name).ok_or_else(|| {
                    PipelineError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dep_name.clone(),
                    }
                })?;

                if !builder.graph.contains_edge(*dep_node, step_node) {
                    builder.graph.add_edge(*dep_node, step_node, ());
                }
            }
        }

        // Validate no cycles
        builder.validate_acyclic()?;

        Ok(builder)
    }

    /// Validate that the graph is acyclic
    fn validate_acyclic(&self) -> Result<(), PipelineError> {
        toposort(&self.graph, None).map(|_| ()).map_err(|cycle| {
            PipelineError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            }
        })
    }

    /// Find the steps on a cycle through `start`
    fn find_cycle_members(&self, start: NodeIndex) -> Vec<String> {
        // Walk predecessors breadth-first until we arrive back at start
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if next == start {
                    let mut members = vec![self.index_to_name[&start].clone()];
                    let mut cursor = node;
                    while cursor != start {
                        members.push(self.index_to_name[&cursor].clone());
                        cursor = parent[&cursor];
                    }
                    members[1..].reverse();
                    return members;
                }
                if !parent.contains_key(&next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            }
        }

        vec![self.index_to_name[&start].clone()]
    }

    /// Get topologically sorted step indices
    pub fn topological_order(&self) -> Result<Vec<usize>, PipelineError> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| PipelineError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            })
    }

    /// Get topologically sorted step ids
    pub fn topological_order_names(&self) -> Result<Vec<String>, PipelineError> {
        toposort(&self.graph, None)
            .map(|nodes| {
                nodes
                    .into_iter()
                    .map(|n| self.index_to_name[&n].clone())
                    .collect()
            })
            .map_err(|cycle| PipelineError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            })
    }

    /// Get dependencies for a step (steps that must run before it)
    pub fn dependencies(&self, step: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step)?;
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|n| self.index_to_name[&n].clone())
            .collect();
        deps.sort();
        Some(deps)
    }

    /// Get dependents for a step (steps that depend on it)
    pub fn dependents(&self, step: &str) -> Option<Vec<String>> {
        let node = self.name_to_index.get(step)?;
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(*node, Direction::Outgoing)
            .map(|n| self.index_to_name[&n].clone())
            .collect();
        deps.sort();
        Some(deps)
    }

    /// `step` and every step transitively depending on it
    pub fn descendants_inclusive(&self, step: &str) -> BTreeSet<String> {
        let Some(start) = self.name_to_index.get(step) else {
            return BTreeSet::new();
        };

        let mut found = BTreeSet::new();
        let mut bfs = Bfs::new(&self.graph, *start);
        while let Some(node) = bfs.next(&self.graph) {
            found.insert(self.index_to_name[&node].clone());
        }
        found
    }

    /// Steps reachable from the graph roots without entering a `blocked` step
    pub fn reachable_avoiding(&self, blocked: &HashSet<&str>) -> BTreeSet<String> {
        let is_blocked = |n: NodeIndex| blocked.contains(self.index_to_name[&n].as_str());

        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Incoming)
                    .next()
                    .is_none()
                    && !is_blocked(*n)
            })
            .collect();
        seen.extend(queue.iter().copied());

        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if !is_blocked(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        seen.into_iter()
            .map(|n| self.index_to_name[&n].clone())
            .collect()
    }

    /// Steps inside each branch: the entry and everything downstream of it
    pub fn branch_members(&self, pipeline: &Pipeline) -> BTreeMap<String, BTreeSet<String>> {
        pipeline
            .branching
            .branches
            .iter()
            .map(|b| (b.id.clone(), self.descendants_inclusive(&b.entry)))
            .collect()
    }

    /// Steps pruned when `selected` wins: members of the other branches that
    /// cannot be reached without passing through one of their entries
    pub fn pruned_steps(&self, pipeline: &Pipeline, selected: &str) -> BTreeMap<String, String> {
        let rejected: Vec<_> = pipeline
            .branching
            .branches
            .iter()
            .filter(|b| b.id != selected)
            .collect();
        let blocked: HashSet<&str> = rejected.iter().map(|b| b.entry.as_str()).collect();
        let live = self.reachable_avoiding(&blocked);

        let mut pruned = BTreeMap::new();
        for branch in rejected {
            for step in self.descendants_inclusive(&branch.entry) {
                if !live.contains(&step) {
                    pruned.entry(step).or_insert_with(|| branch.id.clone());
                }
            }
        }
        pruned
    }

    /// Label for the edge `from -> to`: the branch id on decision edges
    fn edge_label<'p>(pipeline: &'p Pipeline, from: &str, to: &str) -> Option<&'p str> {
        if from != pipeline.branching.decision_step {
            return None;
        }
        pipeline
            .branching
            .branch_entered_by(to)
            .map(|b| b.id.as_str())
    }

    fn named_edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.index_to_name[&e.source()].as_str(),
                    self.index_to_name[&e.target()].as_str(),
                )
            })
            .collect();
        edges.sort();
        edges
    }

    /// Generate Mermaid diagram of the DAG
    pub fn to_mermaid(&self, pipeline: &Pipeline) -> Result<String, PipelineError> {
        let mut out = String::from("graph TD\n");

        // Add nodes
        for name in self.topological_order_names()? {
            out.push_str(&format!("    {}[{}]\n", name, name));
        }

        // Add edges
        for (from, to) in self.named_edges() {
            match Self::edge_label(pipeline, from, to) {
                Some(label) => out.push_str(&format!("    {} -->|{}| {}\n", from, label, to)),
                None => out.push_str(&format!("    {} --> {}\n", from, to)),
            }
        }

        Ok(out)
    }

    /// Generate DOT diagram of the DAG
    pub fn to_dot(&self, pipeline: &Pipeline) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        // Add edges (nodes are implicit)
        for (from, to) in self.named_edges() {
            match Self::edge_label(pipeline, from, to) {
                Some(label) => out.push_str(&format!(
                    "    \"{}\" -> \"{}\" [label=\"{}\", style=dashed];\n",
                    from, to, label
                )),
                None => out.push_str(&format!("    \"{}\" -> \"{}\";\n", from, to)),
            }
        }

        // Add isolated nodes (no edges)
        let mut isolated: Vec<&str> = self
            .name_to_index
            .iter()
            .filter(|(_, node)| self.graph.neighbors_undirected(**node).next().is_none())
            .map(|(name, _)| name.as_str())
            .collect();
        isolated.sort();
        for name in isolated {
            out.push_str(&format!("    \"{}\";\n", name));
        }

        out.push_str("}\n");
        out
    }

    /// Generate text representation of execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> Result<String, PipelineError> {
        let order = self.topological_order()?;
        let members = self.branch_members(pipeline);
        let mut out = String::new();

        for (i, idx) in order.iter().enumerate() {
            let step = &pipeline.steps[*idx];
            let deps = self.dependencies(&step.id).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, step.id, step.transform.name()));

            let branches: Vec<&str> = members
                .iter()
                .filter(|(_, steps)| steps.contains(&step.id))
                .map(|(branch, _)| branch.as_str())
                .collect();
            if !branches.is_empty() {
                out.push_str(&format!(" <branch: {}>", branches.join(", ")));
            }

            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }

            out.push('\n');
        }

        Ok(out)
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::{BranchRule, MatchPattern};
    use crate::pipeline::{Branch, Branching, Step};
    use crate::transforms::Transform;

    fn make_test_pipeline(steps: Vec<(&str, Vec<&str>)>, branches: Vec<(&str, &str)>) -> Pipeline {
        Pipeline {
            version: "1".into(),
            name: "test".into(),
            description: None,
            output_dir: "output".into(),
            steps: steps
                .into_iter()
                .map(|(id, deps)| {
                    let transform = if id == "decide" {
                        Transform::Branch
                    } else {
                        Transform::DropNullRows
                    };
                    let mut step = Step::new(id, transform);
                    step.depends_on = deps.into_iter().map(String::from).collect();
                    step
                })
                .collect(),
            branching: Branching {
                decision_step: "decide".into(),
                variable: "transform_action".into(),
                rules: branches
                    .iter()
                    .map(|(id, _)| BranchRule {
                        pattern: MatchPattern::Exact(id.to_string()),
                        branch: id.to_string(),
                    })
                    .collect(),
                branches: branches
                    .into_iter()
                    .map(|(id, entry)| Branch {
                        id: id.into(),
                        entry: entry.into(),
                        description: None,
                    })
                    .collect(),
            },
        }
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|s| s == id).unwrap()
    }

    #[test]
    fn test_linear_dag() {
        let pipeline = make_test_pipeline(
            vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])],
            vec![],
        );

        let dag = DagBuilder::build(&pipeline).unwrap();
        let order = dag.topological_order_names().unwrap();

        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_dag() {
        let pipeline = make_test_pipeline(
            vec![
                ("a", vec![]),
                ("b", vec!["a"]),
                ("c", vec!["a"]),
                ("d", vec!["b", "c"]),
            ],
            vec![],
        );

        let dag = DagBuilder::build(&pipeline).unwrap();
        let order = dag.topological_order_names().unwrap();

        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
        assert_eq!(dag.dependencies("d").unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_implicit_input_edge() {
        let mut pipeline = make_test_pipeline(vec![("a", vec![]), ("b", vec![])], vec![]);
        pipeline.steps[1].input = Some("a".into());

        let dag = DagBuilder::build(&pipeline).unwrap();
        assert_eq!(dag.dependencies("b").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_circular_dependency_detection() {
        let pipeline = make_test_pipeline(
            vec![("a", vec!["c"]), ("b", vec!["a"]), ("c", vec!["b"])],
            vec![],
        );

        match DagBuilder::build(&pipeline) {
            Err(PipelineError::CircularDependency { steps }) => {
                assert_eq!(steps.len(), 3);
                for id in ["a", "b", "c"] {
                    assert!(steps.contains(&id.to_string()));
                }
            }
            other => panic!("Expected CircularDependency, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_unknown_dependency() {
        let pipeline = make_test_pipeline(vec![("a", vec!["nonexistent"])], vec![]);

        let result = DagBuilder::build(&pipeline);
        assert!(matches!(result, Err(PipelineError::UnknownDependency { .. })));
    }

    #[test]
    fn test_duplicate_step() {
        let pipeline = make_test_pipeline(vec![("a", vec![]), ("a", vec![])], vec![]);

        let result = DagBuilder::build(&pipeline);
        assert!(matches!(result, Err(PipelineError::DuplicateStep { .. })));
    }

    fn branching_pipeline() -> Pipeline {
        // ingest -> decide -> {f1 -> f2 | g1 -> g2}; join needs f2 and ingest; tail needs g2
        make_test_pipeline(
            vec![
                ("ingest", vec![]),
                ("decide", vec!["ingest"]),
                ("f1", vec!["decide"]),
                ("f2", vec!["f1"]),
                ("g1", vec!["decide"]),
                ("g2", vec!["g1"]),
                ("join", vec!["f2", "ingest"]),
                ("tail", vec!["g2"]),
            ],
            vec![("filtering", "f1"), ("grouping", "g1")],
        )
    }

    #[test]
    fn test_pruned_steps_exclusive_descendants_only() {
        let pipeline = branching_pipeline();
        let dag = DagBuilder::build(&pipeline).unwrap();

        let pruned = dag.pruned_steps(&pipeline, "grouping");
        let ids: Vec<&str> = pruned.keys().map(String::as_str).collect();
        // join is reachable through ingest, so it is not pruned
        assert_eq!(ids, vec!["f1", "f2"]);
        assert!(pruned.values().all(|b| b == "filtering"));

        let pruned = dag.pruned_steps(&pipeline, "filtering");
        let ids: Vec<&str> = pruned.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["g1", "g2", "tail"]);
    }

    #[test]
    fn test_branch_members() {
        let pipeline = branching_pipeline();
        let dag = DagBuilder::build(&pipeline).unwrap();
        let members = dag.branch_members(&pipeline);

        assert!(members["filtering"].contains("join"));
        assert!(members["grouping"].contains("tail"));
        assert!(!members["grouping"].contains("decide"));
    }

    #[test]
    fn test_order_puts_decision_before_branches() {
        let pipeline = branching_pipeline();
        let dag = DagBuilder::build(&pipeline).unwrap();
        let order = dag.topological_order_names().unwrap();

        assert!(position(&order, "decide") < position(&order, "f1"));
        assert!(position(&order, "decide") < position(&order, "g1"));
    }

    #[test]
    fn test_mermaid_output_labels_branches() {
        let pipeline = branching_pipeline();
        let dag = DagBuilder::build(&pipeline).unwrap();
        let mermaid = dag.to_mermaid(&pipeline).unwrap();

        assert!(mermaid.contains("graph TD"));
        assert!(mermaid.contains("ingest --> decide"));
        assert!(mermaid.contains("decide -->|filtering| f1"));
    }

    #[test]
    fn test_dot_and_text_output() {
        let pipeline = branching_pipeline();
        let dag = DagBuilder::build(&pipeline).unwrap();

        let dot = dag.to_dot(&pipeline);
        assert!(dot.contains("\"decide\" -> \"g1\" [label=\"grouping\", style=dashed];"));

        let text = dag.to_text(&pipeline).unwrap();
        assert!(text.starts_with("1. ingest (drop_null_rows)\n"));
        assert!(text.contains("f1 (drop_null_rows) <branch: filtering> [depends: decide]"));
    }
}
