use crate::{
    FunctionFamily, NodeEntry, NodeId, PipelineSpec, canonical_function_name, resolve_edges,
    short_name,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fallback placement for nodes without a carried-over position.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    pub origin_x: f64,
    pub origin_y: f64,
    pub row_spacing: f64,
    pub dependency_offset_x: f64,
    pub stagger_y: f64,
    pub stagger_period: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: 220.0,
            origin_y: 90.0,
            row_spacing: 90.0,
            dependency_offset_x: 200.0,
            stagger_y: 12.0,
            stagger_period: 5,
        }
    }
}

impl LayoutConfig {
    /// Position for the node at `index` in document order.
    pub fn fallback_position(&self, index: usize, dependency: Option<Position>) -> Position {
        match dependency {
            Some(dep) => {
                let stagger = (index % self.stagger_period.max(1)) as f64 * self.stagger_y;
                Position::new(dep.x + self.dependency_offset_x, dep.y + stagger)
            }
            None => Position::new(self.origin_x, self.origin_y + self.row_spacing * index as f64),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStyle {
    Source,
    Method,
    Combine,
    Code,
    Call,
}

impl NodeStyle {
    pub fn for_entry(entry: &NodeEntry) -> Self {
        match entry.family() {
            FunctionFamily::Read => Self::Source,
            FunctionFamily::Method(_) | FunctionFamily::Indexer(_) => Self::Method,
            FunctionFamily::Merge => Self::Combine,
            FunctionFamily::Code => Self::Code,
            FunctionFamily::Dotted { .. } | FunctionFamily::TopLevel => Self::Call,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,
    pub label: String,
    pub position: Position,
    pub style: NodeStyle,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub animated: bool,
}

/// Render-ready view of a spec. Always rebuilt, never edited in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn node(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == node_id)
    }

    /// Positions keyed by id, for carrying over into the next projection.
    pub fn positions(&self) -> HashMap<NodeId, Position> {
        self.nodes
            .iter()
            .map(|node| (node.id.clone(), node.position))
            .collect()
    }
}

/// Display label: the short function name, or the id when no function is set.
pub fn node_label(node_id: &str, entry: &NodeEntry) -> String {
    let name = if entry.function.is_empty() {
        node_id
    } else {
        entry.function.as_str()
    };
    short_name(canonical_function_name(name)).to_string()
}

/// Projects `spec` into a flow graph.
///
/// Nodes in `prior_positions` keep their position. Others are placed right
/// of their first dependency when its position is known (including positions
/// assigned earlier in this pass), else on the fallback grid.
pub fn project(
    spec: &PipelineSpec,
    prior_positions: &HashMap<NodeId, Position>,
    layout: &LayoutConfig,
) -> FlowGraph {
    let mut placed: HashMap<&str, Position> = HashMap::with_capacity(spec.len());
    let mut nodes = Vec::with_capacity(spec.len());

    for (index, (node_id, entry)) in spec.nodes.iter().enumerate() {
        let position = match prior_positions.get(node_id) {
            Some(position) => *position,
            None => {
                let dependency = entry.dependencies.first().and_then(|dep| {
                    placed
                        .get(dep.as_str())
                        .or_else(|| prior_positions.get(dep))
                        .copied()
                });
                layout.fallback_position(index, dependency)
            }
        };
        placed.insert(node_id.as_str(), position);

        nodes.push(FlowNode {
            id: node_id.clone(),
            label: node_label(node_id, entry),
            position,
            style: NodeStyle::for_entry(entry),
        });
    }

    let edges = resolve_edges(spec)
        .into_iter()
        .map(|edge| FlowEdge {
            id: edge.id(),
            source: edge.source,
            target: edge.target,
            animated: true,
        })
        .collect();

    FlowGraph { nodes, edges }
}
