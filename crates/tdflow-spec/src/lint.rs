use crate::{Diagnostic, PipelineSpec, ReceiverKey, ValidationError, node_references};

pub trait LintRule {
    fn name(&self) -> &str;
    fn apply(&self, spec: &PipelineSpec) -> Vec<Diagnostic>;
}

/// Runs the built-in rules followed by `extra_rules`. Never mutates.
pub fn validate(spec: &PipelineSpec, extra_rules: &[&dyn LintRule]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    diagnostics.extend(rule_empty_function(spec));
    diagnostics.extend(rule_dangling_dependency(spec));
    diagnostics.extend(rule_dangling_receiver(spec));
    diagnostics.extend(rule_unwired_receiver(spec));
    diagnostics.extend(rule_self_reference(spec));

    for rule in extra_rules {
        diagnostics.extend(rule.apply(spec));
    }

    diagnostics
}

pub fn validate_or_raise(
    spec: &PipelineSpec,
    extra_rules: &[&dyn LintRule],
) -> Result<Vec<Diagnostic>, ValidationError> {
    let diagnostics = validate(spec, extra_rules);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(ValidationError::new(diagnostics));
    }
    Ok(diagnostics)
}

fn rule_empty_function(spec: &PipelineSpec) -> Vec<Diagnostic> {
    spec.nodes
        .iter()
        .filter(|(_, entry)| entry.function.trim().is_empty())
        .map(|(node_id, _)| {
            Diagnostic::error("empty_function", "node has no function").on_node(node_id.clone())
        })
        .collect()
}

fn rule_dangling_dependency(spec: &PipelineSpec) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (node_id, entry) in &spec.nodes {
        for dep in entry.dependencies.iter().filter(|dep| !spec.contains(dep)) {
            diagnostics.push(
                Diagnostic::warning(
                    "dangling_dependency",
                    format!("dependency '{dep}' does not exist"),
                )
                .on_node(node_id.clone())
                .pointing_at(dep.clone())
                .with_fix("remove the dependency or add the missing node"),
            );
        }
    }
    diagnostics
}

fn rule_dangling_receiver(spec: &PipelineSpec) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (node_id, entry) in &spec.nodes {
        for (key, target) in &entry.receivers {
            if spec.contains(target) {
                continue;
            }
            diagnostics.push(
                Diagnostic::warning(
                    "dangling_receiver",
                    format!("params.{} points at missing node '{target}'", key.as_str()),
                )
                .on_node(node_id.clone())
                .pointing_at(target.clone())
                .via_receiver(*key)
                .with_fix(format!("wire params.{} to an existing node", key.as_str())),
            );
        }
    }
    diagnostics
}

fn rule_unwired_receiver(spec: &PipelineSpec) -> Vec<Diagnostic> {
    spec.nodes
        .iter()
        .filter(|(_, entry)| entry.family().needs_receiver() && !entry.has_receiver())
        .map(|(node_id, entry)| {
            Diagnostic::warning(
                "unwired_receiver",
                format!("'{}' needs a receiver but none is set", entry.function),
            )
            .on_node(node_id.clone())
            .via_receiver(ReceiverKey::SelfValue)
            .with_fix("set params.self to the node this step operates on")
        })
        .collect()
}

fn rule_self_reference(spec: &PipelineSpec) -> Vec<Diagnostic> {
    spec.nodes
        .iter()
        .filter(|(node_id, entry)| node_references(spec, entry).contains(node_id.as_str()))
        .map(|(node_id, _)| {
            Diagnostic::warning("self_reference", "node references itself")
                .on_node(node_id.clone())
                .pointing_at(node_id.clone())
        })
        .collect()
}
