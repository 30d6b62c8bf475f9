use crate::{
    CODE_FUNCTION, NodeEntry, Params, PipelineSpec, SpecError, canonical_function_name,
    canonicalize_read_params,
};
use serde_json::{Map, Value};

/// Serialized form of an empty pipeline.
pub const EMPTY_DOCUMENT: &str = "nodes: {}\n";

/// Parses a pipeline document. Never fails: malformed input yields an empty
/// spec.
pub fn parse_spec(source: &str) -> PipelineSpec {
    match parse_spec_strict(source) {
        Ok(spec) => spec,
        Err(error) => {
            tracing::debug!(%error, "pipeline document unreadable, using empty spec");
            PipelineSpec::default()
        }
    }
}

pub fn parse_spec_strict(source: &str) -> Result<PipelineSpec, SpecError> {
    let document: Value = serde_yaml::from_str(source)?;
    spec_from_json(&document)
}

/// Reads a spec from an already decoded document (for example the `spec`
/// field of a generation response).
///
/// A missing or null `nodes` key is an empty spec. Individual node entries
/// are read leniently: anything that is not a mapping becomes an empty entry,
/// non-sequence `dependencies` become `[]` and non-string items are dropped.
pub fn spec_from_json(document: &Value) -> Result<PipelineSpec, SpecError> {
    let nodes = match document {
        Value::Null => return Ok(PipelineSpec::default()),
        Value::Object(root) => match root.get("nodes") {
            None | Some(Value::Null) => return Ok(PipelineSpec::default()),
            Some(Value::Object(nodes)) => nodes,
            Some(_) => {
                return Err(SpecError::InvalidDocument(
                    "'nodes' must be a mapping".to_string(),
                ));
            }
        },
        _ => {
            return Err(SpecError::InvalidDocument(
                "document root must be a mapping".to_string(),
            ));
        }
    };

    let mut spec = PipelineSpec::default();
    for (node_id, value) in nodes {
        spec.insert(node_id.clone(), node_from_json(value));
    }
    Ok(spec)
}

fn node_from_json(value: &Value) -> NodeEntry {
    let Some(object) = value.as_object() else {
        return NodeEntry::default();
    };

    let function = object
        .get("function")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let params = object
        .get("params")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let dependencies = object
        .get("dependencies")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    NodeEntry::from_wire(function, params, dependencies)
}

/// Serializes a spec. Never fails: falls back to [`EMPTY_DOCUMENT`].
pub fn serialize_spec(spec: &PipelineSpec) -> String {
    to_yaml(&spec_to_json(spec))
}

pub fn spec_to_json(spec: &PipelineSpec) -> Value {
    let nodes: Map<String, Value> = spec
        .nodes
        .iter()
        .map(|(node_id, entry)| (node_id.clone(), node_to_json(entry)))
        .collect();
    let mut root = Map::new();
    root.insert("nodes".to_string(), Value::Object(nodes));
    Value::Object(root)
}

fn node_to_json(entry: &NodeEntry) -> Value {
    let mut object = Map::new();
    object.insert("function".to_string(), Value::String(entry.function.clone()));
    object.insert("params".to_string(), Value::Object(entry.wire_params()));
    object.insert(
        "dependencies".to_string(),
        Value::Array(
            entry
                .dependencies
                .iter()
                .cloned()
                .map(Value::String)
                .collect(),
        ),
    );
    Value::Object(object)
}

fn to_yaml(document: &Value) -> String {
    match serde_yaml::to_string(document) {
        Ok(text) => text,
        Err(error) => {
            tracing::debug!(%error, "pipeline document not serializable");
            EMPTY_DOCUMENT.to_string()
        }
    }
}

/// Renders a one-node document for the single-node editor:
///
/// ```yaml
/// nodes:
///   <id>:
///     function: ...
///     params: ...
///     dependencies: [...]
/// ```
pub fn node_document(node_id: &str, entry: &NodeEntry) -> String {
    let spec = PipelineSpec::default().with_node(node_id, entry.clone());
    serialize_spec(&spec)
}

/// Reads back a one-node document for `node_id`.
///
/// Returns `None` when the text is not a valid document or does not contain
/// that node. A missing function defaults to the code node; the function name
/// and read parameters come back canonical.
pub fn parse_node_document(source: &str, node_id: &str) -> Option<NodeEntry> {
    let spec = parse_spec_strict(source).ok()?;
    let mut entry = spec.get(node_id)?.clone();

    let function = match canonical_function_name(&entry.function) {
        "" => CODE_FUNCTION,
        other => other,
    }
    .to_string();
    entry.function = function;
    canonicalize_read_params(&entry.function, &mut entry.params);
    Some(entry)
}

/// Convenience for building wire params in tests and callers.
pub fn params_from_json(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}
