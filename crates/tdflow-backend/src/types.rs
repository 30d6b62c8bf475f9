use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tdflow_spec::{PipelineSpec, parse_spec, short_name, spec_from_json};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionParam {
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub annotation: Option<String>,
}

/// A catalog entry. `name` may be fully qualified, e.g.
/// `pandas.io.api.read_csv`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub params: Vec<FunctionParam>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

impl FunctionInfo {
    /// Definition used when the catalog cannot describe `name`.
    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

/// Orders results by relevance, highest first, then by name.
pub fn sort_by_relevance(functions: &mut [FunctionInfo]) {
    functions.sort_by(|a, b| {
        let a_score = a.relevance_score.unwrap_or_default();
        let b_score = b.relevance_score.unwrap_or_default();
        match b_score.total_cmp(&a_score) {
            Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        }
    });
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
}

/// A file sent along with a preview run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewRequest {
    pub yaml: String,
    pub preview_node: String,
    pub file: Option<UploadFile>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewTable {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl PreviewTable {
    pub fn truncated(mut self, limit: usize) -> Self {
        self.rows.truncate(limit);
        self
    }
}

pub const APPEND_MODE: &str = "append";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NlRequest {
    pub prompt: String,
    pub current_yaml: String,
    /// Node the generated steps should continue from.
    pub receiver: Option<String>,
    pub mode: String,
}

impl NlRequest {
    pub fn append(prompt: impl Into<String>, current_yaml: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            current_yaml: current_yaml.into(),
            receiver: None,
            mode: APPEND_MODE.to_string(),
        }
    }

    pub fn with_receiver(mut self, receiver: Option<String>) -> Self {
        self.receiver = receiver.filter(|id| !id.is_empty());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NlResponse {
    #[serde(default)]
    pub yaml: Option<String>,
    #[serde(default)]
    pub spec: Option<Value>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl NlResponse {
    /// The generated spec: the structured `spec` field when it reads as a
    /// pipeline, else the `yaml` text, else an empty spec.
    pub fn to_spec(&self) -> PipelineSpec {
        if let Some(spec) = self
            .spec
            .as_ref()
            .filter(|value| !value.is_null())
            .and_then(|value| spec_from_json(value).ok())
        {
            return spec;
        }
        self.yaml.as_deref().map(parse_spec).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPipeline {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub yaml: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SavePipelineBody<'a> {
    pub name: &'a str,
    pub yaml: &'a str,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_by_relevance_expected_score_then_name() {
        let mut functions = vec![
            FunctionInfo {
                name: "b".into(),
                relevance_score: Some(70.0),
                ..FunctionInfo::default()
            },
            FunctionInfo {
                name: "c".into(),
                ..FunctionInfo::default()
            },
            FunctionInfo {
                name: "a".into(),
                relevance_score: Some(70.0),
                ..FunctionInfo::default()
            },
            FunctionInfo {
                name: "z".into(),
                relevance_score: Some(120.0),
                ..FunctionInfo::default()
            },
        ];
        sort_by_relevance(&mut functions);
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "b", "c"]);
    }

    #[test]
    fn function_info_decode_minimal_expected_defaults() {
        let info: FunctionInfo = serde_json::from_value(json!({
            "name": "pandas.io.api.read_csv",
            "params": [{"name": "filepath_or_buffer", "kind": "POSITIONAL_OR_KEYWORD", "required": true}]
        }))
        .expect("info should decode");
        assert_eq!(info.short_name(), "read_csv");
        assert!(info.params[0].required);
        assert_eq!(info.params[0].default, None);
    }

    #[test]
    fn nl_response_to_spec_prefers_structured_spec() {
        let response = NlResponse {
            yaml: Some("nodes:\n  from_yaml: {function: concat}\n".to_string()),
            spec: Some(json!({"nodes": {"from_spec": {"function": "concat"}}})),
            mode: Some("append".to_string()),
        };
        assert!(response.to_spec().contains("from_spec"));

        let yaml_only = NlResponse {
            spec: None,
            ..response
        };
        assert!(yaml_only.to_spec().contains("from_yaml"));
        assert!(NlResponse::default().to_spec().is_empty());
    }

    #[test]
    fn saved_pipeline_numeric_id_expected_string() {
        let saved: SavedPipeline =
            serde_json::from_value(json!({"id": 7, "name": "p", "yaml": "nodes: {}"}))
                .expect("decode");
        assert_eq!(saved.id, "7");
    }

    #[test]
    fn nl_request_empty_receiver_expected_none() {
        let request = NlRequest::append("load x.csv", "nodes: {}").with_receiver(Some(String::new()));
        assert_eq!(request.receiver, None);
        assert_eq!(request.mode, "append");
    }
}
