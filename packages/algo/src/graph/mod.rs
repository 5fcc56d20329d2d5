//! Knowledge Graph Validation
//!
//! Checks a freshly ingested graph before anything schedules against it:
//! a graph id usable as a storage scope, unique non-empty node ids,
//! prerequisites that resolve inside the graph, and an acyclic prerequisite
//! relation. Cycles are either rejected or broken deterministically, depending
//! on the policy.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::KnowledgeGraph;

const MIN_DIFFICULTY: u8 = 1;
const MAX_DIFFICULTY: u8 = 5;

/// Separator of the per-graph storage scopes; never part of a graph id.
pub const GRAPH_ID_SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Drop offending edges and record each repair
    #[default]
    Break,
    /// Refuse the graph
    Reject,
}

impl CyclePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "break" => Some(Self::Break),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("invalid graph id {0:?}: must be non-empty and must not contain ':'")]
    InvalidGraphId(String),
    #[error("node at position {0} has an empty id")]
    EmptyId(usize),
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("node {node} requires unknown node {prerequisite}")]
    UnknownPrerequisite { node: String, prerequisite: String },
    #[error("prerequisite cycle through: {}", nodes.join(", "))]
    Cycle { nodes: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GraphRepair {
    DroppedUnknownPrerequisite { node: String, prerequisite: String },
    BrokeCycle { node: String, prerequisite: String },
    ClampedDifficulty { node: String, from: u8, to: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedGraph {
    pub graph: KnowledgeGraph,
    pub repairs: Vec<GraphRepair>,
    /// Node ids, every prerequisite before its dependents
    pub topo_order: Vec<String>,
}

pub fn is_valid_graph_id(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains(GRAPH_ID_SEPARATOR)
}

pub fn validate_graph(graph: &KnowledgeGraph, policy: CyclePolicy) -> Result<ValidatedGraph, GraphError> {
    if !is_valid_graph_id(&graph.id) {
        return Err(GraphError::InvalidGraphId(graph.id.clone()));
    }

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(graph.nodes.len());
    for (position, node) in graph.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            return Err(GraphError::EmptyId(position));
        }
        if index.insert(node.id.as_str(), position).is_some() {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
    }

    let mut repairs = Vec::new();
    let mut validated = graph.clone();

    // Prerequisites as node indices
    let mut requires: Vec<Vec<usize>> = Vec::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        let mut resolved: Vec<usize> = Vec::new();
        for prerequisite in &node.prerequisites {
            match index.get(prerequisite.as_str()) {
                Some(&p) => {
                    if !resolved.contains(&p) {
                        resolved.push(p);
                    }
                }
                None if policy == CyclePolicy::Reject => {
                    return Err(GraphError::UnknownPrerequisite {
                        node: node.id.clone(),
                        prerequisite: prerequisite.clone(),
                    });
                }
                None => repairs.push(GraphRepair::DroppedUnknownPrerequisite {
                    node: node.id.clone(),
                    prerequisite: prerequisite.clone(),
                }),
            }
        }
        requires.push(resolved);
    }

    loop {
        let cyclic_edges = cyclic_edges(&requires);
        if cyclic_edges.is_empty() {
            break;
        }
        if policy == CyclePolicy::Reject {
            let mut nodes: Vec<String> = cyclic_edges
                .iter()
                .flat_map(|&(n, p)| [n, p])
                .collect::<HashSet<_>>()
                .into_iter()
                .map(|i| graph.nodes[i].id.clone())
                .collect();
            nodes.sort();
            return Err(GraphError::Cycle { nodes });
        }

        // Highest dependent id first, then highest prerequisite id.
        let Some(&(n, p)) = cyclic_edges.iter().max_by(|a, b| {
            let key = |&(n, p): &(usize, usize)| (graph.nodes[n].id.as_str(), graph.nodes[p].id.as_str());
            key(*a).cmp(&key(*b))
        }) else {
            break;
        };
        requires[n].retain(|&q| q != p);
        repairs.push(GraphRepair::BrokeCycle {
            node: graph.nodes[n].id.clone(),
            prerequisite: graph.nodes[p].id.clone(),
        });
    }

    for (node, resolved) in validated.nodes.iter_mut().zip(&requires) {
        node.prerequisites = resolved.iter().map(|&p| graph.nodes[p].id.clone()).collect();

        let clamped = node.difficulty_weight.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        if clamped != node.difficulty_weight {
            repairs.push(GraphRepair::ClampedDifficulty {
                node: node.id.clone(),
                from: node.difficulty_weight,
                to: clamped,
            });
            node.difficulty_weight = clamped;
        }
    }

    let topo_order = topological_order(&requires)
        .into_iter()
        .map(|i| graph.nodes[i].id.clone())
        .collect();

    Ok(ValidatedGraph {
        graph: validated,
        repairs,
        topo_order,
    })
}

/// Edges `(node, prerequisite)` that lie on a cycle. A complete Kahn order
/// means there are none; otherwise an edge is cyclic exactly when both ends
/// share a strongly connected component.
fn cyclic_edges(requires: &[Vec<usize>]) -> Vec<(usize, usize)> {
    if topological_order(requires).len() == requires.len() {
        return Vec::new();
    }

    let component = strong_components(requires);
    let mut edges = Vec::new();
    for (node, prerequisites) in requires.iter().enumerate() {
        for &p in prerequisites {
            if component[node] == component[p] {
                edges.push((node, p));
            }
        }
    }
    edges
}

/// Strongly connected component id per node.
fn strong_components(requires: &[Vec<usize>]) -> Vec<usize> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(requires.len(), 0);
    let nodes: Vec<NodeIndex> = requires.iter().map(|_| graph.add_node(())).collect();
    for (node, prerequisites) in requires.iter().enumerate() {
        for &p in prerequisites {
            graph.add_edge(nodes[node], nodes[p], ());
        }
    }

    let mut component = vec![0; requires.len()];
    for (id, members) in tarjan_scc(&graph).into_iter().enumerate() {
        for member in members {
            component[member.index()] = id;
        }
    }
    component
}

/// Kahn's algorithm; ready nodes are released in graph order.
fn topological_order(requires: &[Vec<usize>]) -> Vec<usize> {
    let n = requires.len();
    let mut pending: Vec<usize> = requires.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (node, prerequisites) in requires.iter().enumerate() {
        for &p in prerequisites {
            dependents[p].push(node);
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(node) = ready.pop_front() {
        order.push(node);
        for &d in &dependents[node] {
            pending[d] -= 1;
            if pending[d] == 0 {
                ready.push_back(d);
            }
        }
    }
    order
}

/// Node id to label, for display-facing insights.
pub fn node_labels(graph: &KnowledgeGraph) -> HashMap<String, String> {
    graph
        .nodes
        .iter()
        .map(|node| (node.id.clone(), node.label.clone()))
        .collect()
}
