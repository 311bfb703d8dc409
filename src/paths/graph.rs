//! Skill prerequisite graph
//!
//! Ordering uses Kahn's algorithm: nodes with no pending prerequisites are
//! queued in input order and released as their incoming edges are consumed.
//! A node left with pending edges after the queue drains sits on a cycle and
//! is reported instead of being dropped.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Skill, SkillEdge};

pub type NodeId = String;

#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Prerequisite cycle among: {}", nodes.join(", "))]
    Cycle { nodes: Vec<NodeId> },

    #[error("Edge {from} -> {to} references unknown node {node}")]
    UnknownNode {
        from: NodeId,
        to: NodeId,
        node: NodeId,
    },
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Directed prerequisite edge: `from` must come before `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl From<&SkillEdge> for Edge {
    fn from(edge: &SkillEdge) -> Self {
        Self::new(edge.from_id.clone(), edge.to_id.clone())
    }
}

/// Index nodes (first occurrence wins) and resolve edges to index pairs
fn index_graph(nodes: &[NodeId], edges: &[Edge]) -> Result<(Vec<NodeId>, Vec<(usize, usize)>)> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    let mut unique = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !index.contains_key(node.as_str()) {
            index.insert(node.as_str(), unique.len());
            unique.push(node.clone());
        }
    }

    let mut resolved = Vec::with_capacity(edges.len());
    for edge in edges {
        let lookup = |node: &NodeId| {
            index.get(node.as_str()).copied().ok_or_else(|| GraphError::UnknownNode {
                from: edge.from.clone(),
                to: edge.to.clone(),
                node: node.clone(),
            })
        };
        resolved.push((lookup(&edge.from)?, lookup(&edge.to)?));
    }

    Ok((unique, resolved))
}

/// Order nodes so every prerequisite precedes its dependents.
///
/// Ties are broken by input order. Returns [`GraphError::Cycle`] listing the
/// nodes that could not be placed when the edges are not acyclic.
pub fn topological_order(nodes: &[NodeId], edges: &[Edge]) -> Result<Vec<NodeId>> {
    let (nodes, edges) = index_graph(nodes, edges)?;

    let mut in_degree = vec![0usize; nodes.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for &(from, to) in &edges {
        in_degree[to] += 1;
        successors[from].push(to);
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&n| in_degree[n] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(n) = queue.pop_front() {
        order.push(n);
        for &next in &successors[n] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < nodes.len() {
        let stuck = (0..nodes.len())
            .filter(|&n| in_degree[n] > 0)
            .map(|n| nodes[n].clone())
            .collect();
        return Err(GraphError::Cycle { nodes: stuck });
    }

    Ok(order.into_iter().map(|n| nodes[n].clone()).collect())
}

/// Direct prerequisites of each node that has any
pub fn prerequisites(edges: &[Edge]) -> HashMap<&str, Vec<&str>> {
    let mut map: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        map.entry(edge.to.as_str()).or_default().push(edge.from.as_str());
    }
    map
}

/// Nodes, in `order`, that are not done and whose prerequisites all are.
pub fn next_unlocked(order: &[NodeId], edges: &[Edge], done: &HashSet<NodeId>) -> Vec<NodeId> {
    let prereqs = prerequisites(edges);
    order
        .iter()
        .filter(|n| !done.contains(*n))
        .filter(|n| {
            prereqs
                .get(n.as_str())
                .map_or(true, |before| before.iter().all(|p| done.contains(*p)))
        })
        .cloned()
        .collect()
}

/// Skills a learner can start next given the skills already completed
pub fn next_lessons(skills: &[Skill], edges: &[Edge], done: &HashSet<NodeId>) -> Result<Vec<NodeId>> {
    let ids: Vec<NodeId> = skills.iter().map(|s| s.id.clone()).collect();
    let order = topological_order(&ids, edges)?;
    Ok(next_unlocked(&order, edges, done))
}

/// Rank of each node: length of the longest prerequisite chain leading to it.
///
/// `order` must be a topological order of the nodes touched by `edges`.
pub fn ranks(order: &[NodeId], edges: &[Edge]) -> HashMap<NodeId, usize> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        outgoing.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
    }

    let mut rank: HashMap<NodeId, usize> = order.iter().map(|n| (n.clone(), 0)).collect();
    for node in order {
        let current = rank.get(node).copied().unwrap_or(0);
        if let Some(targets) = outgoing.get(node.as_str()) {
            for target in targets {
                let entry = rank.entry((*target).to_string()).or_insert(0);
                *entry = (*entry).max(current + 1);
            }
        }
    }
    rank
}

/// Geometry of the left-to-right layered layout
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    pub node_width: f64,
    pub node_height: f64,
    /// Vertical gap between nodes in the same rank
    pub node_sep: f64,
    /// Horizontal gap between ranks
    pub rank_sep: f64,
    pub margin_x: f64,
    pub margin_y: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            node_width: 220.0,
            node_height: 64.0,
            node_sep: 80.0,
            rank_sep: 120.0,
            margin_x: 40.0,
            margin_y: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: NodeId,
    pub rank: usize,
    /// Top-left corner of the node box
    pub position: Position,
}

/// Place nodes in columns by rank, keeping topological order within a column.
/// Shorter columns are centred against the tallest one.
pub fn layout(order: &[NodeId], edges: &[Edge], opts: &LayoutOptions) -> Vec<NodePosition> {
    let ranks = ranks(order, edges);

    let mut columns: Vec<Vec<&NodeId>> = Vec::new();
    for node in order {
        let rank = ranks.get(node).copied().unwrap_or(0);
        if columns.len() <= rank {
            columns.resize_with(rank + 1, Vec::new);
        }
        columns[rank].push(node);
    }

    let tallest = columns.iter().map(Vec::len).max().unwrap_or(0);
    let row_step = opts.node_height + opts.node_sep;
    let col_step = opts.node_width + opts.rank_sep;

    let mut positions: HashMap<&NodeId, NodePosition> = HashMap::with_capacity(order.len());
    for (rank, column) in columns.iter().enumerate() {
        let offset = (tallest - column.len()) as f64 * row_step / 2.0;
        for (row, node) in column.iter().enumerate() {
            positions.insert(
                *node,
                NodePosition {
                    id: (*node).clone(),
                    rank,
                    position: Position {
                        x: opts.margin_x + rank as f64 * col_step,
                        y: opts.margin_y + offset + row as f64 * row_step,
                    },
                },
            );
        }
    }

    order.iter().filter_map(|n| positions.remove(n)).collect()
}
