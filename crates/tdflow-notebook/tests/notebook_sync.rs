use serde_json::{Map, json};
use std::sync::Arc;
use tdflow_notebook::{
    CellSource, MemoryNotebookStore, NotebookBridge, NotebookCell, NotebookContent, UpsertOutcome,
    cell_signature, cells_to_spec, parse_header,
};
use tdflow_spec::{NodeEntry, ReceiverKey, parse_spec};

const PATH: &str = "pipeline.ipynb";

fn untagged(source: &str) -> NotebookCell {
    NotebookCell {
        cell_type: "code".to_string(),
        metadata: Map::new(),
        source: CellSource::Lines(source.split_inclusive('\n').map(str::to_string).collect()),
        extra: Map::new(),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn first_observation_of_untagged_notebook_writes_tags_once() {
    let mut content = NotebookContent::empty();
    content.cells.push(untagged("import pandas as pd\n"));
    content.cells.push(untagged("df = pd.DataFrame()\n"));
    let store = MemoryNotebookStore::new().with_notebook(PATH, content);
    let bridge = NotebookBridge::new(Arc::new(store.clone()), PATH);

    let cells = bridge.list_cells().await.expect("cells should list");
    assert_eq!(store.save_count(), 1);
    assert_eq!(
        cells.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec!["cell_1", "cell_2"]
    );

    let saved = store.notebook(PATH).expect("notebook saved");
    assert_eq!(saved.cells[1].metadata["td_node_id"], json!("cell_2"));

    let spec = cells_to_spec(&cells);
    assert_eq!(spec.get("cell_2").expect("cell_2").function, "python");
}

#[tokio::test(flavor = "current_thread")]
async fn pushed_spec_then_external_edit_expected_new_signature_and_spec() {
    let store = MemoryNotebookStore::new();
    let bridge = NotebookBridge::new(Arc::new(store.clone()), PATH);
    let spec = parse_spec(
        r#"
nodes:
  src: {function: read_csv, params: {filepath_or_buffer: in.csv}}
  clean: {function: DataFrame.dropna, params: {self: src}, dependencies: [src]}
"#,
    );

    for (id, entry) in &spec.nodes {
        bridge.upsert_cell_for_node(id, entry).await.expect("push");
    }
    let pushed = bridge.list_cells().await.expect("list");
    let pushed_signature = cell_signature(&pushed);

    let header = parse_header(&pushed[1].source).expect("generated cells carry a header");
    assert_eq!(header.function, "DataFrame.dropna");

    let mut content = store.notebook(PATH).expect("notebook");
    content.cells[1].metadata.insert("td_params".to_string(), json!({"self": "src", "how": "all"}));
    content.cells[1].source = CellSource::Text("clean = src.dropna(how=\"all\")\n".to_string());
    store.put_external(PATH, content);

    let edited = bridge.list_cells().await.expect("list");
    assert_ne!(cell_signature(&edited), pushed_signature);

    let pulled = cells_to_spec(&edited);
    let clean = pulled.get("clean").expect("clean");
    assert_eq!(clean.receiver(), Some(&"src".to_string()));
    assert_eq!(clean.params.get("how"), Some(&json!("all")));
}

#[tokio::test(flavor = "current_thread")]
async fn upsert_existing_external_cell_expected_replaced_in_place() {
    let mut content = NotebookContent::empty();
    content.cells.push(untagged("a = 1\n"));
    content.cells.push(NotebookCell::for_node(
        "target",
        "concat",
        &Default::default(),
        "old".to_string(),
    ));
    content.cells.push(untagged("c = 3\n"));
    let store = MemoryNotebookStore::new().with_notebook(PATH, content);
    let bridge = NotebookBridge::new(Arc::new(store.clone()), PATH);

    let entry = NodeEntry::new("merge")
        .with_receiver(ReceiverKey::Left, "a")
        .with_receiver(ReceiverKey::Right, "b");
    let outcome = bridge
        .upsert_cell_for_node("target", &entry)
        .await
        .expect("upsert");

    assert_eq!(outcome, UpsertOutcome::Updated(1));
    let saved = store.notebook(PATH).expect("notebook");
    assert_eq!(saved.cells.len(), 3);
    assert!(saved.cells[1].source.text().contains("pd.merge(a, b)"));
}
