//! Python source for pipeline nodes.
//!
//! Every generated cell starts with a header line that carries the node's
//! function and params, so the cell can be read back without metadata:
//!
//! ```text
//! # td:function=<name> params=<json>
//! ```

use regex::Regex;
use serde_json::Value;
use tdflow_spec::{
    FunctionFamily, NodeEntry, Params, READ_SOURCE_PARAM, ReceiverKey, canonical_function_name,
    is_identifier_like,
};

const IMPORTS: &str = "import pandas as pd\nimport numpy as np";
const HEADER_PATTERN: &str = r"^#\s*td:function=([A-Za-z0-9_.]+)\s+params=(\{[\s\S]*\})\s*$";

#[derive(Clone, Debug, PartialEq)]
pub struct CellHeader {
    pub function: String,
    /// `None` when the params JSON does not decode to a mapping.
    pub params: Option<Params>,
}

pub fn header_line(function: &str, params: &Params) -> String {
    format!(
        "# td:function={function} params={}",
        Value::Object(params.clone())
    )
}

/// Reads the header from the first line of `source`. Anything that does not
/// match the header format exactly yields `None`.
pub fn parse_header(source: &str) -> Option<CellHeader> {
    let first = source.lines().next()?;
    let regex = Regex::new(HEADER_PATTERN).ok()?;
    let caps = regex.captures(first)?;
    let function = caps.get(1)?.as_str().to_string();
    let params = caps
        .get(2)
        .and_then(|raw| serde_json::from_str::<Value>(raw.as_str()).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        });
    Some(CellHeader { function, params })
}

/// Source text with the header line removed.
pub fn strip_header(source: &str) -> &str {
    match source.lines().next() {
        Some(first) if parse_header(first).is_some() => source
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or_default(),
        _ => source,
    }
}

/// Node id as a Python identifier: disallowed characters become `_`, and an
/// `n_` prefix is added when the result does not start with a letter or `_`.
pub fn to_py_ident(node_id: &str) -> String {
    let ident: String = node_id
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' })
        .collect();
    match ident.chars().next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => ident,
        _ => format!("n_{ident}"),
    }
}

/// Python rendering of a param value. Identifier-shaped strings are emitted
/// bare, as variable references.
pub fn py_value(value: &Value) -> String {
    match value {
        Value::String(text) if is_identifier_like(text) => text.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// `k=v` pairs joined by `, `. Null values are skipped.
pub fn py_kwargs(params: &Params) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| format!("{key}={}", py_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raw text of a scalar, used where a value is spliced into code as-is.
fn raw_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn without(params: &Params, keys: &[&str]) -> Params {
    params
        .iter()
        .filter(|(key, _)| !keys.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Generates the cell source for a node: header, then a code body chosen by
/// the function family. The result always ends with a newline.
pub fn code_for_node(node_id: &str, entry: &NodeEntry) -> String {
    let function = canonical_function_name(&entry.function);
    let var = to_py_ident(node_id);
    let wire = entry.wire_params();
    let header = header_line(function, &wire);

    let family = entry.family();
    if family == FunctionFamily::Code {
        let body = wire.get("code").and_then(Value::as_str).unwrap_or_default();
        let body = if body.trim().is_empty() { "# python" } else { body };
        return format!("{}\n", format!("{header}\n{body}").trim_end());
    }

    let params = without(&wire, &["self", "df"]);
    let body = match family {
        FunctionFamily::Code => String::new(),
        FunctionFamily::Indexer(indexer) => match entry.receiver() {
            Some(receiver) => {
                let rows = params.get("rows").map(raw_text).unwrap_or_else(|| ":".to_string());
                let cols = params.get("cols").map(raw_text).unwrap_or_else(|| ":".to_string());
                format!(
                    "{var} = {}.{}[{rows}, {cols}]",
                    to_py_ident(receiver),
                    indexer.as_str()
                )
            }
            None => missing_receiver(function, &var, indexer.as_str()),
        },
        FunctionFamily::Method(method) => match entry.receiver() {
            Some(receiver) => format!(
                "{var} = {}.{method}({})",
                to_py_ident(receiver),
                py_kwargs(&params)
            ),
            None => missing_receiver(function, &var, method),
        },
        FunctionFamily::Merge => {
            let side = |key: ReceiverKey, missing: &str| {
                entry
                    .receivers
                    .get(&key)
                    .cloned()
                    .or_else(|| params.get(key.as_str()).filter(|v| !v.is_null()).map(raw_text))
                    .map(|target| to_py_ident(&target))
                    .unwrap_or_else(|| missing.to_string())
            };
            let left = side(ReceiverKey::Left, "LEFT_MISSING");
            let right = side(ReceiverKey::Right, "RIGHT_MISSING");
            let kwargs = py_kwargs(&without(&params, &["left", "right"]));
            let call = if kwargs.is_empty() {
                format!("{left}, {right}")
            } else {
                format!("{left}, {right}, {kwargs}")
            };
            format!("{var} = pd.merge({call})")
        }
        FunctionFamily::Read => {
            let first = params
                .get(READ_SOURCE_PARAM)
                .filter(|value| !value.is_null())
                .map(Value::to_string);
            let kwargs = py_kwargs(&without(&params, &[READ_SOURCE_PARAM]));
            let call = match (first, kwargs.is_empty()) {
                (Some(first), true) => first,
                (Some(first), false) => format!("{first}, {kwargs}"),
                (None, _) => kwargs,
            };
            format!("{var} = pd.{function}({call})")
        }
        FunctionFamily::Dotted { head, rest } => format!(
            "{var} = (getattr(pd, \"{head}\", None) or getattr(np, \"{head}\", None)).{rest}({})",
            py_kwargs(&params)
        ),
        FunctionFamily::TopLevel => format!("{var} = pd.{function}({})", py_kwargs(&params)),
    };

    format!("{header}\n{IMPORTS}\n{body}\n")
}

fn missing_receiver(function: &str, var: &str, method: &str) -> String {
    format!("# receiver not set for {function}\n# {var} = <receiver>.{method}()")
}
