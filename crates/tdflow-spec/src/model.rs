use crate::{FunctionFamily, canonical_function_name};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

pub type NodeId = String;

/// Parameter mapping of a node. Insertion order is preserved.
pub type Params = Map<String, Value>;

/// Parameter names that denote "the node result this step operates on".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReceiverKey {
    #[serde(rename = "self")]
    SelfValue,
    #[serde(rename = "df")]
    Df,
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "right")]
    Right,
}

impl ReceiverKey {
    pub const ALL: [ReceiverKey; 4] = [Self::SelfValue, Self::Df, Self::Left, Self::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfValue => "self",
            Self::Df => "df",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn from_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// One step of the pipeline.
///
/// String-valued receiver parameters are held in `receivers` rather than
/// `params`; [`NodeEntry::wire_params`] folds them back for serialization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeEntry {
    pub function: String,
    pub params: Params,
    pub dependencies: Vec<NodeId>,
    pub receivers: BTreeMap<ReceiverKey, NodeId>,
}

impl NodeEntry {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            ..Self::default()
        }
    }

    /// Builds an entry from its serialized shape, lifting receivers out of
    /// `params`.
    pub fn from_wire(function: impl Into<String>, params: Params, dependencies: Vec<NodeId>) -> Self {
        let mut entry = Self::new(function);
        entry.dependencies = dependencies;
        for (key, value) in params {
            entry.set_param(key, value);
        }
        entry
    }

    /// Inserts a parameter, routing string-valued receiver keys to
    /// `receivers`. A receiver key set to null or `""` clears that receiver
    /// and leaves nothing behind in `params`.
    pub fn set_param(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let Some(receiver) = ReceiverKey::from_param(&key) else {
            self.params.insert(key, value);
            return;
        };

        self.params.retain(|existing, _| existing != &key);
        self.receivers.remove(&receiver);
        match value {
            Value::String(node_id) if !node_id.is_empty() => {
                self.receivers.insert(receiver, node_id);
            }
            Value::Null | Value::String(_) => {}
            other => {
                self.params.insert(key, other);
            }
        }
    }

    /// Points `key` at `node_id`, replacing whatever the params held there.
    pub fn set_receiver(&mut self, key: ReceiverKey, node_id: impl Into<NodeId>) {
        self.set_param(key.as_str(), Value::String(node_id.into()));
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_param(key, value.into());
        self
    }

    pub fn with_dependency(mut self, node_id: impl Into<NodeId>) -> Self {
        self.dependencies.push(node_id.into());
        self
    }

    pub fn with_receiver(mut self, key: ReceiverKey, node_id: impl Into<NodeId>) -> Self {
        self.set_receiver(key, node_id);
        self
    }

    /// Params as they appear on the wire: receivers first, then the rest.
    /// A receiver always wins over a stray params value under the same key.
    pub fn wire_params(&self) -> Params {
        let mut out = Params::new();
        for (key, node_id) in self.wired_receivers() {
            out.insert(key.as_str().to_string(), Value::String(node_id.clone()));
        }
        for (key, value) in &self.params {
            let shadowed = ReceiverKey::from_param(key)
                .is_some_and(|receiver| self.receivers.contains_key(&receiver));
            if !shadowed {
                out.insert(key.clone(), value.clone());
            }
        }
        out
    }

    /// The node this step operates on: `self`, then `df`, then `left`.
    pub fn receiver(&self) -> Option<&NodeId> {
        [ReceiverKey::SelfValue, ReceiverKey::Df, ReceiverKey::Left]
            .iter()
            .find_map(|key| self.receivers.get(key).filter(|node_id| !node_id.is_empty()))
    }

    /// Whether any receiver slot, `right` included, names a node.
    pub fn has_receiver(&self) -> bool {
        self.wired_receivers().next().is_some()
    }

    fn wired_receivers(&self) -> impl Iterator<Item = (&ReceiverKey, &NodeId)> + '_ {
        self.receivers
            .iter()
            .filter(|(_, node_id)| !node_id.is_empty())
    }

    pub fn family(&self) -> FunctionFamily<'_> {
        FunctionFamily::classify(canonical_function_name(&self.function))
    }

    /// Merge-skip equality: same function and same params, ignoring key
    /// order. Dependencies are not compared.
    pub fn same_content(&self, other: &NodeEntry) -> bool {
        self.function == other.function && self.wire_params() == other.wire_params()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineSpec {
    pub nodes: IndexMap<NodeId, NodeEntry>,
}

impl PipelineSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeEntry> {
        self.nodes.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut NodeEntry> {
        self.nodes.get_mut(node_id)
    }

    /// Inserts or replaces an entry. A replaced entry keeps its position.
    pub fn insert(&mut self, node_id: impl Into<NodeId>, entry: NodeEntry) -> Option<NodeEntry> {
        self.nodes.insert(node_id.into(), entry)
    }

    pub fn with_node(mut self, node_id: impl Into<NodeId>, entry: NodeEntry) -> Self {
        self.insert(node_id, entry);
        self
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.nodes.keys()
    }

    pub fn last_node_id(&self) -> Option<&NodeId> {
        self.nodes.keys().next_back()
    }

    /// Removes a node and every reference other nodes hold to it through
    /// `dependencies` or receivers. Literal params are left alone.
    pub fn remove_node(&mut self, node_id: &str) -> Option<NodeEntry> {
        let removed = self.nodes.shift_remove(node_id)?;
        for entry in self.nodes.values_mut() {
            entry.dependencies.retain(|dep| dep != node_id);
            entry.receivers.retain(|_, target| target != node_id);
        }
        Some(removed)
    }

    /// `base` if free, else the first free `base_1`, `base_2`, ...
    pub fn unique_id(&self, base: &str) -> NodeId {
        let taken: HashSet<NodeId> = self.nodes.keys().cloned().collect();
        make_unique_id(base, &taken)
    }
}

pub fn make_unique_id(base: &str, taken: &HashSet<NodeId>) -> NodeId {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_wire_lifts_string_receivers_expected_typed_field() {
        let params = json!({"self": "a", "left": 3, "columns": {"A": "B"}})
            .as_object()
            .cloned()
            .expect("object");
        let entry = NodeEntry::from_wire("DataFrame.rename", params, vec![]);

        assert_eq!(entry.receiver(), Some(&"a".to_string()));
        assert_eq!(entry.params.get("left"), Some(&json!(3)));
        assert!(!entry.params.contains_key("self"));
        assert_eq!(
            entry.wire_params().keys().collect::<Vec<_>>(),
            vec!["self", "left", "columns"]
        );
    }

    #[test]
    fn from_wire_null_or_empty_receiver_expected_unset() {
        for blank in [json!(null), json!("")] {
            let params = json!({"self": blank, "n": 2}).as_object().cloned().expect("object");
            let entry = NodeEntry::from_wire("DataFrame.head", params, vec![]);

            assert_eq!(entry.receiver(), None);
            assert!(!entry.has_receiver());
            assert!(!entry.params.contains_key("self"));
            assert_eq!(entry.wire_params().keys().collect::<Vec<_>>(), vec!["n"]);
        }
    }

    #[test]
    fn set_receiver_over_stray_param_expected_receiver_on_wire() {
        let mut entry = NodeEntry::new("DataFrame.head");
        entry.params.insert("self".to_string(), Value::Null);

        entry.set_receiver(ReceiverKey::SelfValue, "a");
        assert!(!entry.params.contains_key("self"));
        assert_eq!(entry.wire_params().get("self"), Some(&json!("a")));

        entry.params.insert("self".to_string(), Value::Null);
        assert_eq!(entry.wire_params().get("self"), Some(&json!("a")));
    }

    #[test]
    fn has_receiver_right_only_expected_true() {
        let entry = NodeEntry::new("merge").with_receiver(ReceiverKey::Right, "b");
        assert!(entry.has_receiver());
        assert_eq!(entry.receiver(), None);
    }

    #[test]
    fn same_content_ignores_key_order() {
        let a = NodeEntry::new("DataFrame.fillna")
            .with_param("value", 0)
            .with_param("axis", 1);
        let b = NodeEntry::new("DataFrame.fillna")
            .with_param("axis", 1)
            .with_param("value", 0);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&b.clone().with_param("axis", 0)));
    }

    #[test]
    fn remove_node_strips_dependencies_and_receivers() {
        let mut spec = PipelineSpec::new()
            .with_node("a", NodeEntry::new("read_csv"))
            .with_node(
                "b",
                NodeEntry::new("DataFrame.dropna")
                    .with_receiver(ReceiverKey::SelfValue, "a")
                    .with_dependency("a"),
            )
            .with_node(
                "c",
                NodeEntry::new("DataFrame.rename")
                    .with_receiver(ReceiverKey::SelfValue, "b")
                    .with_param("note", "b")
                    .with_dependency("b"),
            );

        let removed = spec.remove_node("b").expect("b should be removed");
        assert_eq!(removed.function, "DataFrame.dropna");

        let c = spec.get("c").expect("c should remain");
        assert!(c.dependencies.is_empty());
        assert!(c.receivers.is_empty());
        assert_eq!(c.params.get("note"), Some(&json!("b")));
        assert_eq!(spec.node_ids().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn unique_id_appends_first_free_suffix() {
        let spec = PipelineSpec::new()
            .with_node("x", NodeEntry::new("concat"))
            .with_node("x_1", NodeEntry::new("concat"));
        assert_eq!(spec.unique_id("x"), "x_2");
        assert_eq!(spec.unique_id("y"), "y");
    }
}
