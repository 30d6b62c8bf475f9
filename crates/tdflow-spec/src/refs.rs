use crate::{NodeEntry, NodeId, PipelineSpec};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A data dependency `source -> target`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: NodeId,
    pub target: NodeId,
}

impl DependencyEdge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// `"<source>-><target>"`, unique per ordered pair.
    pub fn id(&self) -> String {
        format!("{}->{}", self.source, self.target)
    }
}

/// Collects every string leaf of `value` that names a node of `spec`.
/// Non-string leaves never match.
pub fn collect_refs(value: &Value, spec: &PipelineSpec, acc: &mut IndexSet<NodeId>) {
    match value {
        Value::String(text) => {
            if spec.contains(text) {
                acc.insert(text.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, spec, acc);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_refs(item, spec, acc);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Nodes of `spec` that `entry` depends on: explicit dependencies first,
/// then receivers, then references found anywhere inside params.
pub fn node_references(spec: &PipelineSpec, entry: &NodeEntry) -> IndexSet<NodeId> {
    let mut refs: IndexSet<NodeId> = entry
        .dependencies
        .iter()
        .chain(entry.receivers.values())
        .filter(|node_id| spec.contains(node_id))
        .cloned()
        .collect();
    for value in entry.params.values() {
        collect_refs(value, spec, &mut refs);
    }
    refs
}

/// The full dependency edge set of `spec`, in target order.
///
/// `(u, v)` is present iff `v` lists `u` as a dependency or receiver, or a
/// string equal to `u` appears anywhere in `v`'s params, and `u` is a node.
/// Each ordered pair appears once.
pub fn resolve_edges(spec: &PipelineSpec) -> Vec<DependencyEdge> {
    spec.nodes
        .iter()
        .flat_map(|(target, entry)| {
            node_references(spec, entry)
                .into_iter()
                .map(move |source| DependencyEdge::new(source, target.clone()))
        })
        .collect()
}

/// Rewrites every string leaf found in `renames` to its new id. Each value is
/// looked up once, so chained renames do not compound.
pub fn rewrite_refs(value: &mut Value, renames: &IndexMap<NodeId, NodeId>) {
    match value {
        Value::String(text) => {
            if let Some(renamed) = renames.get(text.as_str()) {
                *text = renamed.clone();
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, renames);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                rewrite_refs(item, renames);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Applies `renames` to an entry's dependencies, receivers and params.
pub fn rewrite_entry_refs(entry: &mut NodeEntry, renames: &IndexMap<NodeId, NodeId>) {
    for dep in &mut entry.dependencies {
        if let Some(renamed) = renames.get(dep.as_str()) {
            *dep = renamed.clone();
        }
    }
    for target in entry.receivers.values_mut() {
        if let Some(renamed) = renames.get(target.as_str()) {
            *target = renamed.clone();
        }
    }
    for value in entry.params.values_mut() {
        rewrite_refs(value, renames);
    }
}
