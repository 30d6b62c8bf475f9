use crate::{
    Diagnostic, LintRule, PipelineSpec, ReceiverKey, SpecError, canonical_function_name,
    canonicalize_read_params, parse_spec_strict, validate,
};

pub trait Transform: Send + Sync {
    fn apply(&self, spec: &mut PipelineSpec) -> Result<(), SpecError>;
}

/// Strips namespace qualifiers from every node's function name.
#[derive(Clone, Debug, Default)]
pub struct FunctionNameTransform;

impl Transform for FunctionNameTransform {
    fn apply(&self, spec: &mut PipelineSpec) -> Result<(), SpecError> {
        canonicalize_function_names(spec);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReadAliasTransform;

impl Transform for ReadAliasTransform {
    fn apply(&self, spec: &mut PipelineSpec) -> Result<(), SpecError> {
        fold_all_read_aliases(spec);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReceiverWiringTransform;

impl Transform for ReceiverWiringTransform {
    fn apply(&self, spec: &mut PipelineSpec) -> Result<(), SpecError> {
        wire_receivers(spec);
        Ok(())
    }
}

pub fn canonicalize_function_names(spec: &mut PipelineSpec) {
    for entry in spec.nodes.values_mut() {
        let canonical = canonical_function_name(&entry.function);
        if canonical.len() != entry.function.len() {
            entry.function = canonical.to_string();
        }
    }
}

pub fn fold_all_read_aliases(spec: &mut PipelineSpec) {
    for entry in spec.nodes.values_mut() {
        canonicalize_read_params(&entry.function, &mut entry.params);
    }
}

/// Gives every receiver-needing node without a receiver a `self` receiver:
/// its last dependency, else the node right before it in document order.
/// Nodes with neither stay unwired. A node with any receiver slot set,
/// `right` included, counts as wired and is untouched. A null or empty
/// receiver param is unset.
pub fn wire_receivers(spec: &mut PipelineSpec) {
    let ids: Vec<_> = spec.node_ids().cloned().collect();
    for (index, node_id) in ids.iter().enumerate() {
        let Some(entry) = spec.nodes.get_mut(node_id) else {
            continue;
        };
        if !entry.family().needs_receiver() || entry.has_receiver() {
            continue;
        }

        let candidate = entry
            .dependencies
            .last()
            .cloned()
            .or_else(|| index.checked_sub(1).map(|prev| ids[prev].clone()));
        let Some(candidate) = candidate else {
            tracing::debug!(node_id = %node_id, "no receiver candidate, leaving unwired");
            continue;
        };

        if !entry.dependencies.contains(&candidate) {
            entry.dependencies.push(candidate.clone());
        }
        entry.set_receiver(ReceiverKey::SelfValue, candidate);
    }
}

/// Full-spec normalization pass. Idempotent.
pub fn normalize_spec(spec: &mut PipelineSpec) {
    canonicalize_function_names(spec);
    fold_all_read_aliases(spec);
    wire_receivers(spec);
}

pub fn apply_builtin_transforms(spec: &mut PipelineSpec) -> Result<(), SpecError> {
    FunctionNameTransform.apply(spec)?;
    ReadAliasTransform.apply(spec)?;
    ReceiverWiringTransform.apply(spec)?;
    Ok(())
}

/// Parses, normalizes, runs extra transforms and lints a document.
pub fn prepare_spec(
    source: &str,
    custom_transforms: &[&dyn Transform],
    extra_rules: &[&dyn LintRule],
) -> Result<(PipelineSpec, Vec<Diagnostic>), SpecError> {
    let mut spec = parse_spec_strict(source)?;
    apply_builtin_transforms(&mut spec)?;

    for transform in custom_transforms {
        transform.apply(&mut spec)?;
    }

    let diagnostics = validate(&spec, extra_rules);
    Ok((spec, diagnostics))
}
