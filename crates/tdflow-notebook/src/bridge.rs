use crate::store::{NotebookResult, NotebookStore};
use crate::{NotebookCell, NotebookConfig, NotebookContent, TdCell, code_for_node, parse_header, strip_header};
use serde_json::Value;
use std::sync::Arc;
use tdflow_spec::{CODE_FUNCTION, NodeEntry, NodeId, PipelineSpec, canonical_function_name};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated(usize),
    Appended(usize),
}

/// Mirrors pipeline nodes into one notebook, one tagged code cell per node.
#[derive(Clone)]
pub struct NotebookBridge {
    store: Arc<dyn NotebookStore>,
    path: String,
}

impl std::fmt::Debug for NotebookBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookBridge")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl NotebookBridge {
    pub fn new(store: Arc<dyn NotebookStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    pub fn from_config(config: &NotebookConfig) -> Self {
        Self::new(
            Arc::new(crate::JupyterContentsClient::from_config(config)),
            config.path.clone(),
        )
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Loads the notebook, creating an empty one first when it is missing.
    pub async fn ensure_notebook(&self) -> NotebookResult<NotebookContent> {
        if let Some(content) = self.store.load(&self.path).await? {
            return Ok(content);
        }
        let content = NotebookContent::empty();
        self.store.save(&self.path, &content).await?;
        tracing::info!(path = %self.path, "created notebook");
        Ok(content)
    }

    /// Code cells as pipeline cells.
    ///
    /// Untagged code cells are tagged `cell_<index+1>` and the notebook is
    /// written back once before returning.
    pub async fn list_cells(&self) -> NotebookResult<Vec<TdCell>> {
        let mut content = self.ensure_notebook().await?;
        let (cells, modified) = tag_and_collect(&mut content);
        if modified {
            self.store.save(&self.path, &content).await?;
            tracing::debug!(path = %self.path, "tagged untagged notebook cells");
        }
        Ok(cells)
    }

    pub async fn find_cell(&self, node_id: &str) -> NotebookResult<Option<TdCell>> {
        Ok(self
            .list_cells()
            .await?
            .into_iter()
            .find(|cell| cell.id == node_id))
    }

    /// Writes the cell for `node_id`, replacing a tagged cell in place or
    /// appending a new one. Never creates a second cell for the same id.
    pub async fn upsert_cell_for_node(
        &self,
        node_id: &str,
        entry: &NodeEntry,
    ) -> NotebookResult<UpsertOutcome> {
        let mut content = self.ensure_notebook().await?;
        let function = canonical_function_name(&entry.function);
        let cell = NotebookCell::for_node(
            node_id,
            function,
            &entry.wire_params(),
            code_for_node(node_id, entry),
        );

        let outcome = match content.position_of(node_id) {
            Some(index) => {
                content.cells[index] = cell;
                UpsertOutcome::Updated(index)
            }
            None => {
                content.cells.push(cell);
                UpsertOutcome::Appended(content.cells.len() - 1)
            }
        };
        self.store.save(&self.path, &content).await?;
        tracing::info!(node_id, path = %self.path, ?outcome, "pushed node cell");
        Ok(outcome)
    }

    /// Deletes every cell tagged with one of `node_ids`. Returns how many
    /// were removed; an empty id list does no I/O.
    pub async fn delete_cells_for_nodes(&self, node_ids: &[NodeId]) -> NotebookResult<usize> {
        if node_ids.is_empty() {
            return Ok(0);
        }
        let mut content = self.ensure_notebook().await?;
        let before = content.cells.len();
        content
            .cells
            .retain(|cell| !cell.node_id().is_some_and(|id| node_ids.iter().any(|n| n == id)));
        let removed = before - content.cells.len();
        self.store.save(&self.path, &content).await?;
        Ok(removed)
    }
}

fn tag_and_collect(content: &mut NotebookContent) -> (Vec<TdCell>, bool) {
    let mut modified = false;
    let mut cells = Vec::new();

    for (index, cell) in content.cells.iter_mut().enumerate() {
        if !cell.is_code() {
            continue;
        }
        if cell.node_id().is_none() {
            cell.set_node_id(format!("cell_{}", index + 1));
            modified = true;
        }

        let source = cell.source.text();
        let header = parse_header(&source);
        let function = cell
            .meta_function()
            .map(str::to_string)
            .or_else(|| header.as_ref().map(|h| h.function.clone()));
        let params = cell
            .meta_params()
            .cloned()
            .or_else(|| header.and_then(|h| h.params));

        cells.push(TdCell {
            index,
            id: cell.node_id().unwrap_or_default().to_string(),
            function,
            params,
            source,
        });
    }

    (cells, modified)
}

/// Reads cells back into a spec, in cell order.
///
/// Cells with a known function become that node. Cells without one become
/// code nodes holding their source, minus any header line. Dependencies are
/// not recoverable from cells and start empty.
pub fn cells_to_spec(cells: &[TdCell]) -> PipelineSpec {
    let mut spec = PipelineSpec::new();
    for cell in cells {
        let entry = match &cell.function {
            Some(function) => NodeEntry::from_wire(
                canonical_function_name(function),
                cell.params.clone().unwrap_or_default(),
                Vec::new(),
            ),
            None => NodeEntry::new(CODE_FUNCTION).with_param(
                "code",
                Value::String(strip_header(&cell.source).trim_end().to_string()),
            ),
        };
        spec.insert(cell.id.clone(), entry);
    }
    spec
}
