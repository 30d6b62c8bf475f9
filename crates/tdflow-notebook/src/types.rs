use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tdflow_spec::{NodeId, Params};

pub const META_NODE_ID: &str = "td_node_id";
pub const META_FUNCTION: &str = "td_function";
pub const META_PARAMS: &str = "td_params";

pub const CODE_CELL: &str = "code";

/// nbformat 4 notebook body, as carried in the contents API `content` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotebookContent {
    #[serde(default)]
    pub cells: Vec<NotebookCell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub nbformat: u32,
    pub nbformat_minor: u32,
}

impl NotebookContent {
    /// Fresh python3 notebook, marked as managed by this tool.
    pub fn empty() -> Self {
        let metadata = json!({
            "kernelspec": {"display_name": "Python 3", "name": "python3", "language": "python"},
            "language_info": {"name": "python"},
            "td_synced": true,
        });
        Self {
            cells: Vec::new(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            nbformat: 4,
            nbformat_minor: 5,
        }
    }

    /// Position of the code cell tagged with `node_id`.
    pub fn position_of(&self, node_id: &str) -> Option<usize> {
        self.cells
            .iter()
            .position(|cell| cell.is_code() && cell.node_id() == Some(node_id))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl CellSource {
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Lines(lines) => lines.concat(),
        }
    }
}

/// A notebook cell. Fields other than the ones named here (outputs,
/// execution_count, id, attachments) are kept verbatim in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotebookCell {
    pub cell_type: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub source: CellSource,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotebookCell {
    /// A fresh, unexecuted code cell for a pipeline node.
    pub fn for_node(node_id: &str, function: &str, params: &Params, source: String) -> Self {
        let mut metadata = Map::new();
        metadata.insert(META_NODE_ID.to_string(), Value::String(node_id.to_string()));
        metadata.insert(META_FUNCTION.to_string(), Value::String(function.to_string()));
        metadata.insert(META_PARAMS.to_string(), Value::Object(params.clone()));

        let mut extra = Map::new();
        extra.insert("execution_count".to_string(), Value::Null);
        extra.insert("outputs".to_string(), Value::Array(Vec::new()));

        let source = if source.ends_with('\n') {
            source
        } else {
            format!("{source}\n")
        };

        Self {
            cell_type: CODE_CELL.to_string(),
            metadata,
            source: CellSource::Text(source),
            extra,
        }
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CODE_CELL
    }

    pub fn node_id(&self) -> Option<&str> {
        self.metadata
            .get(META_NODE_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn set_node_id(&mut self, node_id: impl Into<String>) {
        self.metadata
            .insert(META_NODE_ID.to_string(), Value::String(node_id.into()));
    }

    pub fn meta_function(&self) -> Option<&str> {
        self.metadata
            .get(META_FUNCTION)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn meta_params(&self) -> Option<&Params> {
        self.metadata.get(META_PARAMS).and_then(Value::as_object)
    }
}

/// Pipeline view of one code cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TdCell {
    pub index: usize,
    pub id: NodeId,
    pub function: Option<String>,
    pub params: Option<Params>,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notebook_cell_unknown_fields_expected_preserved() {
        let raw = json!({
            "cell_type": "code",
            "id": "abc",
            "execution_count": 3,
            "metadata": {"td_node_id": "n1"},
            "outputs": [{"output_type": "stream"}],
            "source": ["x = 1\n", "y = 2\n"]
        });
        let cell: NotebookCell = serde_json::from_value(raw.clone()).expect("cell should decode");

        assert_eq!(cell.node_id(), Some("n1"));
        assert_eq!(cell.source.text(), "x = 1\ny = 2\n");
        assert_eq!(serde_json::to_value(&cell).expect("encode"), raw);
    }

    #[test]
    fn notebook_content_empty_expected_python_kernel() {
        let empty = NotebookContent::empty();
        assert_eq!(empty.nbformat, 4);
        assert_eq!(empty.nbformat_minor, 5);
        assert_eq!(empty.metadata["kernelspec"]["name"], json!("python3"));
        assert_eq!(empty.metadata["td_synced"], json!(true));
    }

    #[test]
    fn for_node_expected_trailing_newline_and_metadata() {
        let cell = NotebookCell::for_node("a", "read_csv", &Params::new(), "x".to_string());
        assert_eq!(cell.source.text(), "x\n");
        assert_eq!(cell.meta_function(), Some("read_csv"));
        assert_eq!(cell.extra.get("outputs"), Some(&json!([])));
    }
}
