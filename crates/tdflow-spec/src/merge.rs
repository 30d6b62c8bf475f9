use crate::{
    NodeId, PipelineSpec, canonical_function_name, canonicalize_read_params, make_unique_id,
    normalize_spec, rewrite_entry_refs,
};
use indexmap::IndexMap;
use std::collections::HashSet;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeOutcome {
    pub spec: PipelineSpec,
    /// Incoming ids that collided with different content, old -> new.
    pub renames: IndexMap<NodeId, NodeId>,
    /// Incoming ids dropped because an identical entry already existed.
    pub skipped: Vec<NodeId>,
    /// Ids appended to the spec, after renaming.
    pub added: Vec<NodeId>,
}

/// Merges `incoming` into `current`.
///
/// A free id is kept. A colliding id whose entry has the same content is
/// skipped. Any other collision is renamed to the first free `id_N`, and
/// every dependency, receiver and nested param string naming an old id is
/// rewritten, all renames at once. Incoming entries are then canonicalized,
/// appended in incoming order, and the whole result is normalized.
pub fn merge_specs(current: &PipelineSpec, incoming: &PipelineSpec) -> MergeOutcome {
    let mut taken: HashSet<NodeId> = current.node_ids().cloned().collect();
    let mut renames = IndexMap::new();
    let mut skipped = Vec::new();

    for (node_id, entry) in &incoming.nodes {
        if !taken.contains(node_id) {
            taken.insert(node_id.clone());
            continue;
        }
        let identical = current
            .get(node_id)
            .is_some_and(|existing| existing.same_content(entry));
        if identical {
            skipped.push(node_id.clone());
            continue;
        }
        let fresh = make_unique_id(node_id, &taken);
        taken.insert(fresh.clone());
        renames.insert(node_id.clone(), fresh);
    }

    let mut spec = current.clone();
    let mut added = Vec::new();
    for (node_id, entry) in &incoming.nodes {
        if skipped.contains(node_id) {
            continue;
        }
        let new_id = renames.get(node_id).unwrap_or(node_id).clone();

        let mut entry = entry.clone();
        rewrite_entry_refs(&mut entry, &renames);
        entry.function = canonical_function_name(&entry.function).to_string();
        canonicalize_read_params(&entry.function, &mut entry.params);

        spec.insert(new_id.clone(), entry);
        added.push(new_id);
    }

    normalize_spec(&mut spec);

    if !renames.is_empty() || !skipped.is_empty() {
        tracing::debug!(
            renamed = renames.len(),
            skipped = skipped.len(),
            added = added.len(),
            "merged incoming spec"
        );
    }

    MergeOutcome {
        spec,
        renames,
        skipped,
        added,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeEntry, ReceiverKey};
    use serde_json::json;

    #[test]
    fn merge_identical_collision_expected_skip() {
        let current = PipelineSpec::new().with_node(
            "x",
            NodeEntry::new("DataFrame.fillna")
                .with_param("value", 0)
                .with_param("axis", 0),
        );
        let incoming = PipelineSpec::new().with_node(
            "x",
            NodeEntry::new("DataFrame.fillna")
                .with_param("axis", 0)
                .with_param("value", 0),
        );

        let outcome = merge_specs(&current, &incoming);
        assert_eq!(outcome.skipped, vec!["x".to_string()]);
        assert!(outcome.renames.is_empty());
        assert_eq!(outcome.spec.len(), 1);
    }

    #[test]
    fn merge_chained_collisions_expected_single_step_rewrites() {
        let current = PipelineSpec::new().with_node("x", NodeEntry::new("read_csv"));
        let incoming = PipelineSpec::new()
            .with_node("x", NodeEntry::new("read_json"))
            .with_node(
                "x_1",
                NodeEntry::new("DataFrame.head")
                    .with_receiver(ReceiverKey::SelfValue, "x")
                    .with_dependency("x"),
            )
            .with_node(
                "y",
                NodeEntry::new("concat").with_param("objs", json!(["x", "x_1"])),
            );

        let outcome = merge_specs(&current, &incoming);

        assert_eq!(outcome.renames.get("x"), Some(&"x_1".to_string()));
        assert_eq!(outcome.renames.get("x_1"), Some(&"x_2".to_string()));
        assert_eq!(outcome.added, vec!["x_1", "x_2", "y"]);

        let head = outcome.spec.get("x_2").expect("renamed head");
        assert_eq!(head.receiver(), Some(&"x_1".to_string()));
        assert_eq!(head.dependencies, vec!["x_1".to_string()]);
        assert_eq!(
            outcome.spec.get("y").expect("y").params.get("objs"),
            Some(&json!(["x_1", "x_2"]))
        );
        assert_eq!(outcome.spec.get("x").expect("x").function, "read_csv");
    }

    #[test]
    fn merge_canonicalizes_incoming_entries() {
        let incoming = PipelineSpec::new().with_node(
            "r",
            NodeEntry::new("pandas.read_parquet").with_param("path", "a.parquet"),
        );
        let outcome = merge_specs(&PipelineSpec::new(), &incoming);
        let r = outcome.spec.get("r").expect("r");
        assert_eq!(r.function, "read_parquet");
        assert_eq!(r.params.get("filepath_or_buffer"), Some(&json!("a.parquet")));
        assert!(!r.params.contains_key("path"));
    }

    #[test]
    fn merge_appended_method_expected_wired_to_current_tail() {
        let current = PipelineSpec::new().with_node("src", NodeEntry::new("read_csv"));
        let incoming = PipelineSpec::new().with_node("clean", NodeEntry::new("DataFrame.dropna"));
        let outcome = merge_specs(&current, &incoming);
        let clean = outcome.spec.get("clean").expect("clean");
        assert_eq!(clean.receiver(), Some(&"src".to_string()));
    }

    #[test]
    fn merge_same_inputs_expected_deterministic() {
        let current = PipelineSpec::new().with_node("a", NodeEntry::new("read_csv"));
        let incoming = PipelineSpec::new()
            .with_node("a", NodeEntry::new("read_excel"))
            .with_node("b", NodeEntry::new("DataFrame.head"));
        assert_eq!(merge_specs(&current, &incoming), merge_specs(&current, &incoming));
    }
}
