use crate::local_store::KeyValueStore;
use crate::{
    SelectedFile, SelectedFileBus, SessionConfig, SessionError, SessionEvent, SessionEventSink,
    SessionResult, SyncGuard, find_uploaded_file,
};
use std::collections::HashMap;
use std::time::Duration;
use tdflow_backend::{
    FunctionCatalog, FunctionInfo, NlRequest, PipelineBackend, PreviewRequest, PreviewTable,
    SavedPipeline, UploadFile,
};
use tdflow_notebook::{NotebookBridge, NotebookWatch, TdCell, cells_to_spec, watch_notebook};
use tdflow_spec::{
    Diagnostic, FlowGraph, MergeOutcome, NodeEntry, NodeId, Params, PipelineSpec, Position,
    READ_SOURCE_PARAM, ReceiverKey, canonical_function_name, canonicalize_read_params,
    import_text, is_read_function, merge_specs, node_document, normalize_spec, parse_node_document,
    parse_spec, project, serialize_spec, short_name, validate,
};
use tokio::sync::mpsc;

/// A node opened in the parameter editor.
#[derive(Clone, Debug, PartialEq)]
pub struct EditTarget {
    pub node_id: NodeId,
    pub function: FunctionInfo,
    /// Current params in wire shape, read aliases folded.
    pub params: Params,
    pub dependencies: Vec<NodeId>,
    /// The node was found only in the notebook, not in the spec.
    pub from_notebook: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PreviewOutcome {
    Table(PreviewTable),
    /// The backend needs an input for this node before it can run it.
    NeedsReceiver(EditTarget),
}

/// One editing session over a pipeline document.
///
/// The document text is the source of truth. Every mutation rewrites it,
/// reprojects the graph keeping known node positions, and mirrors touched
/// nodes to the notebook when one is attached. Notebook failures never undo
/// a local mutation.
pub struct PipelineEditor {
    config: SessionConfig,
    yaml_text: String,
    spec: PipelineSpec,
    positions: HashMap<NodeId, Position>,
    graph: FlowGraph,
    notebook: Option<NotebookBridge>,
    guard: SyncGuard,
    files: SelectedFileBus,
    events: SessionEventSink,
}

impl std::fmt::Debug for PipelineEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEditor")
            .field("nodes", &self.spec.len())
            .field("notebook", &self.notebook.as_ref().map(NotebookBridge::path))
            .finish_non_exhaustive()
    }
}

impl Default for PipelineEditor {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl PipelineEditor {
    pub fn new(config: SessionConfig) -> Self {
        let guard = SyncGuard::new(config.settle_delay());
        let spec = PipelineSpec::new();
        Self {
            yaml_text: serialize_spec(&spec),
            graph: project(&spec, &HashMap::new(), &config.layout),
            spec,
            positions: HashMap::new(),
            notebook: None,
            guard,
            files: SelectedFileBus::new(),
            events: SessionEventSink::default(),
            config,
        }
    }

    pub fn with_notebook(mut self, bridge: NotebookBridge) -> Self {
        self.notebook = Some(bridge);
        self
    }

    pub fn with_file_bus(mut self, files: SelectedFileBus) -> Self {
        self.files = files;
        self
    }

    pub fn with_events(mut self, events: SessionEventSink) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn yaml_text(&self) -> &str {
        &self.yaml_text
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    pub fn files(&self) -> &SelectedFileBus {
        &self.files
    }

    pub fn notebook(&self) -> Option<&NotebookBridge> {
        self.notebook.as_ref()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        validate(&self.spec, &[])
    }

    /// Replaces the document with hand-edited text. Unreadable text yields an
    /// empty pipeline.
    pub fn set_yaml_text(&mut self, text: &str) {
        let mut spec = parse_spec(text);
        normalize_spec(&mut spec);
        self.commit(spec);
    }

    /// Moves a node on the canvas. Returns `false` for unknown ids.
    pub fn set_position(&mut self, node_id: &str, position: Position) -> bool {
        if !self.spec.contains(node_id) {
            return false;
        }
        self.positions.insert(node_id.to_string(), position);
        self.reproject();
        true
    }

    /// Opens the document queued in `store`, if any.
    pub fn load_open_pipeline(&mut self, store: &dyn KeyValueStore) -> SessionResult<bool> {
        match store.take_open_pipeline()? {
            Some(yaml) => {
                self.set_yaml_text(&yaml);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Selects `file` for read nodes and previews, and remembers its name in
    /// `store`.
    pub fn select_file(&self, file: SelectedFile, store: &dyn KeyValueStore) -> SessionResult<()> {
        store.set_selected_file_name(Some(&file.name))?;
        self.files.set(Some(file));
        Ok(())
    }

    /// Re-selects the file remembered in `store`, matched among `candidates`.
    /// Returns the name of the file now selected.
    pub fn restore_selected_file(
        &self,
        store: &dyn KeyValueStore,
        candidates: &[SelectedFile],
    ) -> SessionResult<Option<String>> {
        let Some(name) = store.selected_file_name()? else {
            return Ok(None);
        };
        let Some(file) = find_uploaded_file(&name, candidates) else {
            tracing::debug!(%name, "remembered data file is no longer available");
            return Ok(None);
        };
        self.files.set(Some(file.clone()));
        Ok(Some(file.name.clone()))
    }

    /// The node as a one-node document for text editing.
    pub fn node_yaml(&self, node_id: &str) -> Option<String> {
        self.spec
            .get(node_id)
            .map(|entry| node_document(node_id, entry))
    }

    /// Replaces `node_id` with the entry read back from a one-node document.
    /// The node keeps its place in the document.
    pub async fn edit_node_yaml(&mut self, node_id: &str, text: &str) -> SessionResult<()> {
        if !self.spec.contains(node_id) {
            return Err(SessionError::UnknownNode(node_id.to_string()));
        }
        let entry = parse_node_document(text, node_id)
            .ok_or_else(|| SessionError::InvalidNodeDocument(node_id.to_string()))?;

        let mut spec = self.spec.clone();
        spec.insert(node_id.to_string(), entry);
        normalize_spec(&mut spec);
        self.commit(spec);
        self.events.emit(SessionEvent::NodeUpdated {
            node_id: node_id.to_string(),
        });
        self.push_node(node_id).await;
        Ok(())
    }

    /// Appends a node calling `function`.
    ///
    /// The id is `<short name>_<node count>`, made unique. A receiver-needing
    /// function with no receiver set, a null or empty one included, is wired
    /// to the last node. Read functions get their source aliases folded and
    /// default the source to the selected file.
    pub async fn add_function_node(&mut self, function: &str, params: Params) -> NodeId {
        let canonical = canonical_function_name(function).to_string();
        let base = format!("{}_{}", short_name(&canonical), self.spec.len());
        let node_id = self.spec.unique_id(&base);

        let mut entry = NodeEntry::from_wire(canonical.clone(), params, Vec::new());
        if entry.family().needs_receiver() && !entry.has_receiver() {
            if let Some(previous) = self.spec.last_node_id().cloned() {
                entry.set_receiver(ReceiverKey::SelfValue, previous.clone());
                entry.dependencies = vec![previous];
            }
        }
        if is_read_function(&canonical) {
            canonicalize_read_params(&canonical, &mut entry.params);
            let missing = entry
                .params
                .get(READ_SOURCE_PARAM)
                .is_none_or(|value| value.is_null());
            if let (true, Some(file)) = (missing, self.files.get()) {
                entry.set_param(READ_SOURCE_PARAM, file.name.into());
            }
        }

        let mut spec = self.spec.clone();
        spec.insert(node_id.clone(), entry);
        self.commit(spec);
        self.events.emit(SessionEvent::NodeAdded {
            node_id: node_id.clone(),
        });
        self.push_node(&node_id).await;
        node_id
    }

    /// Rewrites `node_id` with the editor's values, appending it when new,
    /// then normalizes the document.
    pub async fn apply_params(
        &mut self,
        node_id: &str,
        function: &str,
        params: Params,
        dependencies: Vec<NodeId>,
    ) {
        let canonical = canonical_function_name(function).to_string();
        let mut entry = NodeEntry::from_wire(canonical.clone(), params, dependencies);
        canonicalize_read_params(&canonical, &mut entry.params);

        let mut spec = self.spec.clone();
        spec.insert(node_id.to_string(), entry);
        normalize_spec(&mut spec);
        self.commit(spec);
        self.events.emit(SessionEvent::NodeUpdated {
            node_id: node_id.to_string(),
        });
        self.push_node(node_id).await;
    }

    /// Removes nodes along with every dependency and receiver pointing at
    /// them, then deletes their notebook cells. Returns the ids that existed.
    pub async fn remove_nodes(&mut self, node_ids: &[NodeId]) -> Vec<NodeId> {
        let mut spec = self.spec.clone();
        let removed: Vec<NodeId> = node_ids
            .iter()
            .filter(|node_id| spec.remove_node(node_id).is_some())
            .cloned()
            .collect();
        if removed.is_empty() {
            return removed;
        }
        for node_id in &removed {
            self.positions.remove(node_id);
        }
        self.commit(spec);
        self.events.emit(SessionEvent::NodesRemoved {
            node_ids: removed.clone(),
        });

        if let Some(bridge) = &self.notebook {
            self.guard.engage();
            if let Err(error) = bridge.delete_cells_for_nodes(&removed).await {
                tracing::warn!(%error, nodes = ?removed, "failed to delete notebook cells");
                self.events.emit(SessionEvent::NotebookSyncFailed {
                    node_id: None,
                    message: error.to_string(),
                });
            }
            self.guard.engage();
        }
        removed
    }

    /// Resolves a node for editing: the spec entry, else its notebook cell.
    /// The function definition comes from `catalog`; a catalog failure falls
    /// back to a bare definition with no parameters.
    pub async fn open_for_edit(
        &self,
        node_id: &str,
        catalog: &dyn FunctionCatalog,
    ) -> SessionResult<EditTarget> {
        let (entry, from_notebook) = match self.spec.get(node_id) {
            Some(entry) => (entry.clone(), false),
            None => (self.entry_from_notebook(node_id).await?, true),
        };

        let function = canonical_function_name(&entry.function).to_string();
        let definition = match catalog.function_detail(&function).await {
            Ok(Some(definition)) => definition,
            Ok(None) => FunctionInfo::fallback(function.clone()),
            Err(error) => {
                tracing::warn!(%error, function = %function, "function detail unavailable");
                FunctionInfo::fallback(function.clone())
            }
        };

        let mut params = entry.wire_params();
        canonicalize_read_params(&function, &mut params);
        Ok(EditTarget {
            node_id: node_id.to_string(),
            function: definition,
            params,
            dependencies: entry.dependencies,
            from_notebook,
        })
    }

    async fn entry_from_notebook(&self, node_id: &str) -> SessionResult<NodeEntry> {
        let bridge = self
            .notebook
            .as_ref()
            .ok_or_else(|| SessionError::UnknownNode(node_id.to_string()))?;
        let cell = bridge
            .find_cell(node_id)
            .await?
            .ok_or_else(|| SessionError::UnknownNode(node_id.to_string()))?;
        let mut spec = cells_to_spec(std::slice::from_ref(&cell));
        spec.nodes
            .shift_remove(node_id)
            .ok_or_else(|| SessionError::UnknownNode(node_id.to_string()))
    }

    /// Runs the document up to `node_id` and returns the first rows of its
    /// result. The selected file, if any, is sent along.
    pub async fn preview(
        &self,
        node_id: &str,
        backend: &dyn PipelineBackend,
        catalog: &dyn FunctionCatalog,
    ) -> SessionResult<PreviewOutcome> {
        if !self.spec.contains(node_id) {
            return Err(SessionError::UnknownNode(node_id.to_string()));
        }
        let request = PreviewRequest {
            yaml: self.yaml_text.clone(),
            preview_node: node_id.to_string(),
            file: self.files.get().map(|file| UploadFile {
                name: file.name,
                bytes: file.bytes.to_vec(),
            }),
        };

        match backend.run_preview(request).await {
            Ok(table) => {
                let table = table.truncated(self.config.preview_row_limit);
                self.events.emit(SessionEvent::PreviewReady {
                    node_id: node_id.to_string(),
                    rows: table.rows.len(),
                });
                Ok(PreviewOutcome::Table(table))
            }
            Err(error) if error.requires_receiver() => {
                tracing::info!(node_id, "preview needs a receiver, opening editor");
                self.events.emit(SessionEvent::ReceiverRequired {
                    node_id: node_id.to_string(),
                });
                Ok(PreviewOutcome::NeedsReceiver(
                    self.open_for_edit(node_id, catalog).await?,
                ))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Previews the last node of the document.
    pub async fn run_pipeline(
        &self,
        backend: &dyn PipelineBackend,
        catalog: &dyn FunctionCatalog,
    ) -> SessionResult<PreviewOutcome> {
        let last = self
            .spec
            .last_node_id()
            .cloned()
            .ok_or(SessionError::EmptyPipeline)?;
        self.preview(&last, backend, catalog).await
    }

    /// Asks the backend to extend the pipeline from a prompt and merges the
    /// result. The last node is offered as the receiver for new steps.
    pub async fn generate_from_prompt(
        &mut self,
        prompt: &str,
        backend: &dyn PipelineBackend,
    ) -> SessionResult<MergeOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(SessionError::MissingPrompt);
        }
        let request = NlRequest::append(prompt, self.yaml_text.clone())
            .with_receiver(self.spec.last_node_id().cloned());
        let response = backend.nl_to_yaml(request).await?;
        let outcome = merge_specs(&self.spec, &response.to_spec());
        self.apply_merge(&outcome).await;
        Ok(outcome)
    }

    /// Merges the first pipeline block found in pasted text.
    pub async fn import_pasted(&mut self, text: &str) -> SessionResult<MergeOutcome> {
        let outcome = import_text(&self.spec, text).ok_or(SessionError::NoPipelineBlock)?;
        self.apply_merge(&outcome).await;
        Ok(outcome)
    }

    async fn apply_merge(&mut self, outcome: &MergeOutcome) {
        self.commit(outcome.spec.clone());
        self.events.emit(SessionEvent::Merged {
            added: outcome.added.clone(),
            renamed: outcome
                .renames
                .iter()
                .map(|(from, to)| (from.clone(), to.clone()))
                .collect(),
            skipped: outcome.skipped.clone(),
        });
        for node_id in &outcome.added {
            self.push_node(node_id).await;
        }
    }

    /// Takes cells observed in the notebook as the new document. Ignored
    /// while our own push is settling. Returns whether the document changed.
    pub fn apply_external_cells(&mut self, cells: &[TdCell]) -> bool {
        if self.guard.is_active() {
            tracing::debug!(cells = cells.len(), "ignoring notebook change during settle window");
            self.events.emit(SessionEvent::ExternalCellsIgnored);
            return false;
        }
        self.replace_from_cells(cells)
    }

    /// Reads the notebook now and takes its cells, settle window or not.
    pub async fn pull_from_notebook(&mut self) -> SessionResult<bool> {
        let Some(bridge) = &self.notebook else {
            return Ok(false);
        };
        let cells = bridge.list_cells().await?;
        Ok(self.replace_from_cells(&cells))
    }

    fn replace_from_cells(&mut self, cells: &[TdCell]) -> bool {
        let mut incoming = cells_to_spec(cells);
        for (node_id, entry) in incoming.nodes.iter_mut() {
            if !entry.dependencies.is_empty() {
                continue;
            }
            if let Some(existing) = self.spec.get(node_id) {
                entry.dependencies = existing.dependencies.clone();
            }
        }
        normalize_spec(&mut incoming);
        if incoming == self.spec {
            return false;
        }

        let node_count = incoming.len();
        self.commit(incoming);
        self.events.emit(SessionEvent::ExternalCellsApplied { node_count });
        true
    }

    /// Writes every node to the notebook. Unlike per-mutation pushes, a
    /// failure here is returned.
    pub async fn push_all_to_notebook(&self) -> SessionResult<usize> {
        let Some(bridge) = &self.notebook else {
            return Ok(0);
        };
        self.guard.engage();
        for (node_id, entry) in &self.spec.nodes {
            bridge.upsert_cell_for_node(node_id, entry).await?;
        }
        self.guard.engage();
        Ok(self.spec.len())
    }

    /// Starts polling the attached notebook. Changed cell lists arrive on the
    /// returned channel; feed them to [`PipelineEditor::apply_external_cells`].
    pub fn watch_notebook(
        &self,
        interval: Duration,
    ) -> Option<(NotebookWatch, mpsc::UnboundedReceiver<Vec<TdCell>>)> {
        let bridge = self.notebook.clone()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let watch = watch_notebook(bridge, interval, move |cells| {
            let _ = tx.send(cells);
        });
        Some((watch, rx))
    }

    pub async fn save_pipeline(
        &self,
        name: &str,
        backend: &dyn PipelineBackend,
    ) -> SessionResult<SavedPipeline> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::MissingName);
        }
        let saved = backend.save_pipeline(name, &self.yaml_text).await?;
        tracing::info!(id = %saved.id, name = %saved.name, "saved pipeline");
        Ok(saved)
    }

    async fn push_node(&self, node_id: &str) {
        let (Some(bridge), Some(entry)) = (&self.notebook, self.spec.get(node_id)) else {
            return;
        };
        self.guard.engage();
        match bridge.upsert_cell_for_node(node_id, entry).await {
            Ok(_) => self.events.emit(SessionEvent::NotebookPushed {
                node_id: node_id.to_string(),
            }),
            Err(error) => {
                tracing::warn!(%error, node_id, "failed to push node to notebook");
                self.events.emit(SessionEvent::NotebookSyncFailed {
                    node_id: Some(node_id.to_string()),
                    message: error.to_string(),
                });
            }
        }
        self.guard.engage();
    }

    fn commit(&mut self, spec: PipelineSpec) {
        self.yaml_text = serialize_spec(&spec);
        self.positions.retain(|node_id, _| spec.contains(node_id));
        self.spec = spec;
        self.reproject();
        self.events.emit(SessionEvent::SpecChanged {
            node_count: self.spec.len(),
        });
    }

    fn reproject(&mut self) {
        self.graph = project(&self.spec, &self.positions, &self.config.layout);
        self.positions = self.graph.positions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKeyValueStore;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn add_function_node_expected_counted_id_and_wired_receiver() {
        let mut editor = PipelineEditor::default();
        let source = editor
            .add_function_node("pandas.read_csv", params(json!({"path": "x.csv"})))
            .await;
        let head = editor.add_function_node("DataFrame.head", Params::new()).await;

        assert_eq!(source, "read_csv_0");
        assert_eq!(head, "head_1");
        let entry = editor.spec().get("head_1").expect("head node");
        assert_eq!(entry.receiver(), Some(&"read_csv_0".to_string()));
        assert_eq!(entry.dependencies, vec!["read_csv_0".to_string()]);
        let read = editor.spec().get("read_csv_0").expect("read node");
        assert_eq!(read.params.get("filepath_or_buffer"), Some(&json!("x.csv")));
        assert!(!read.params.contains_key("path"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn add_function_node_null_self_expected_wired_to_last_node() {
        let mut editor = PipelineEditor::default();
        editor.add_function_node("read_csv", Params::new()).await;
        let node = editor
            .add_function_node("DataFrame.rename", params(json!({"self": null, "columns": {"a": "b"}})))
            .await;

        let entry = editor.spec().get(&node).expect("rename node");
        assert_eq!(entry.wire_params().get("self"), Some(&json!("read_csv_0")));
        assert!(editor.yaml_text().contains("self: read_csv_0"));
        assert!(!editor.yaml_text().contains("self: null"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn add_function_node_supplied_receiver_expected_untouched() {
        let mut editor = PipelineEditor::default();
        editor.add_function_node("read_csv", Params::new()).await;
        editor.add_function_node("read_json", Params::new()).await;
        let node = editor
            .add_function_node("DataFrame.merge", params(json!({"left": "read_csv_0"})))
            .await;
        let entry = editor.spec().get(&node).expect("merge node");
        assert_eq!(entry.receiver(), Some(&"read_csv_0".to_string()));
        assert!(entry.dependencies.is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn add_read_node_with_selected_file_expected_source_defaulted() {
        let files = SelectedFileBus::new();
        files.set(Some(SelectedFile::new("sales.csv", b"a\n1\n".to_vec())));
        let mut editor = PipelineEditor::default().with_file_bus(files);

        let id = editor.add_function_node("read_csv", Params::new()).await;
        let explicit = editor
            .add_function_node("read_csv", params(json!({"io": "other.csv"})))
            .await;

        assert_eq!(
            editor.spec().get(&id).and_then(|e| e.params.get("filepath_or_buffer")),
            Some(&json!("sales.csv"))
        );
        assert_eq!(
            editor.spec().get(&explicit).and_then(|e| e.params.get("filepath_or_buffer")),
            Some(&json!("other.csv"))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remove_nodes_expected_references_stripped() {
        let mut editor = PipelineEditor::default();
        editor.set_yaml_text(
            "nodes:\n  a: {function: read_csv}\n  b: {function: DataFrame.dropna, params: {self: a}, dependencies: [a]}\n  c: {function: DataFrame.head, params: {self: b, n: 3}, dependencies: [b]}\n",
        );

        let removed = editor
            .remove_nodes(&["b".to_string(), "zz".to_string()])
            .await;

        assert_eq!(removed, vec!["b".to_string()]);
        let c = editor.spec().get("c").expect("c stays");
        assert!(!c.dependencies.contains(&"b".to_string()));
        assert!(!c.wire_params().contains_key("self"));
        assert!(editor.graph().node("b").is_none());
        assert!(!editor.yaml_text().contains("b:"));
    }

    #[test]
    fn set_yaml_text_malformed_expected_empty_spec() {
        let mut editor = PipelineEditor::default();
        editor.set_yaml_text("nodes: [unclosed");
        assert!(editor.spec().is_empty());
        assert!(editor.graph().nodes.is_empty());
    }

    #[test]
    fn set_position_expected_kept_across_reprojection() {
        let mut editor = PipelineEditor::default();
        editor.set_yaml_text("nodes:\n  a: {function: read_csv}\n");
        assert!(editor.set_position("a", Position::new(5.0, 7.0)));
        editor.set_yaml_text("nodes:\n  a: {function: read_csv}\n  b: {function: concat}\n");

        assert_eq!(editor.graph().node("a").map(|n| n.position), Some(Position::new(5.0, 7.0)));
        assert!(!editor.set_position("missing", Position::default()));
    }

    #[test]
    fn apply_external_cells_during_settle_window_expected_ignored() {
        let mut editor = PipelineEditor::default();
        let cells = vec![TdCell {
            index: 0,
            id: "a".to_string(),
            function: Some("read_csv".to_string()),
            params: Some(Params::new()),
            source: String::new(),
        }];

        editor.guard().engage();
        assert!(!editor.apply_external_cells(&cells));
        assert!(editor.spec().is_empty());

        editor.guard().release();
        assert!(editor.apply_external_cells(&cells));
        assert!(editor.spec().contains("a"));
        assert!(!editor.apply_external_cells(&cells), "same cells change nothing");
    }

    #[test]
    fn apply_external_cells_expected_dependencies_preserved() {
        let mut editor = PipelineEditor::default();
        editor.set_yaml_text(
            "nodes:\n  a: {function: read_csv}\n  b: {function: concat, dependencies: [a]}\n",
        );
        let cells = vec![
            TdCell {
                index: 0,
                id: "a".to_string(),
                function: Some("read_csv".to_string()),
                params: Some(params(json!({"filepath_or_buffer": "new.csv"}))),
                source: String::new(),
            },
            TdCell {
                index: 1,
                id: "b".to_string(),
                function: Some("concat".to_string()),
                params: Some(Params::new()),
                source: String::new(),
            },
        ];

        assert!(editor.apply_external_cells(&cells));
        assert_eq!(
            editor.spec().get("b").map(|e| e.dependencies.clone()),
            Some(vec!["a".to_string()])
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn edit_node_yaml_expected_node_replaced_in_place() {
        let mut editor = PipelineEditor::default();
        editor.set_yaml_text(
            "nodes:\n  a: {function: read_csv}\n  b: {function: DataFrame.head, dependencies: [a]}\n  c: {function: concat}\n",
        );
        let text = editor.node_yaml("b").expect("b document");
        assert!(text.contains("function: DataFrame.head"));

        editor
            .edit_node_yaml(
                "b",
                "nodes:\n  b:\n    function: pandas.DataFrame.tail\n    params: {n: 3}\n    dependencies: [a]\n",
            )
            .await
            .expect("edit should apply");

        let ids: Vec<&str> = editor.spec().node_ids().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let b = editor.spec().get("b").expect("b");
        assert_eq!(b.function, "DataFrame.tail");
        assert_eq!(b.params.get("n"), Some(&json!(3)));
        assert_eq!(b.receiver(), Some(&"a".to_string()));
        assert!(editor.yaml_text().contains("function: DataFrame.tail"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn edit_node_yaml_wrong_node_expected_error_and_spec_untouched() {
        let mut editor = PipelineEditor::default();
        editor.set_yaml_text("nodes:\n  a: {function: read_csv}\n");
        let before = editor.yaml_text().to_string();

        let error = editor
            .edit_node_yaml("a", "nodes:\n  other: {function: concat}\n")
            .await
            .expect_err("document without the node should fail");
        assert!(matches!(error, SessionError::InvalidNodeDocument(ref id) if id == "a"));

        let error = editor
            .edit_node_yaml("ghost", "nodes:\n  ghost: {function: concat}\n")
            .await
            .expect_err("unknown node should fail");
        assert!(matches!(error, SessionError::UnknownNode(_)));
        assert_eq!(editor.yaml_text(), before);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn restore_selected_file_expected_remembered_file_used_by_read_node() {
        let store = MemoryKeyValueStore::new();
        let first = PipelineEditor::default();
        first
            .select_file(SelectedFile::new("Sales.csv", b"a\n1\n".to_vec()), &store)
            .expect("select should persist");
        assert_eq!(
            store.selected_file_name().expect("read"),
            Some("Sales.csv".to_string())
        );

        let mut editor = PipelineEditor::default();
        let candidates = vec![
            SelectedFile::new("other.csv", b"x\n".to_vec()),
            SelectedFile::new("sales.csv", b"a\n1\n".to_vec()),
        ];
        let restored = editor
            .restore_selected_file(&store, &candidates)
            .expect("restore should read the store");
        assert_eq!(restored.as_deref(), Some("sales.csv"));

        editor.add_function_node("read_csv", Params::new()).await;
        let read = editor.spec().get("read_csv_0").expect("read node");
        assert_eq!(read.params.get("filepath_or_buffer"), Some(&json!("sales.csv")));
    }

    #[test]
    fn restore_selected_file_missing_candidate_expected_nothing_selected() {
        let store = MemoryKeyValueStore::new();
        store
            .set_selected_file_name(Some("gone.csv"))
            .expect("store write");
        let editor = PipelineEditor::default();
        let restored = editor
            .restore_selected_file(&store, &[SelectedFile::new("a.csv", b"".to_vec())])
            .expect("restore should read the store");
        assert!(restored.is_none());
        assert!(editor.files().get().is_none());
    }
}
