//! Mirror of a pipeline in a live Jupyter notebook.
//!
//! Each node owns one code cell tagged with its id. Cells are generated from
//! node entries, read back through metadata or the header line, and watched
//! by polling with a content signature so only real changes are reported.

pub mod bridge;
pub mod codegen;
pub mod config;
pub mod contents;
pub mod memory;
pub mod store;
pub mod types;
pub mod watch;

pub use bridge::{NotebookBridge, UpsertOutcome, cells_to_spec};
pub use codegen::{
    CellHeader, code_for_node, header_line, parse_header, py_kwargs, py_value, strip_header,
    to_py_ident,
};
pub use config::{DEFAULT_JUPYTER_URL, DEFAULT_NOTEBOOK_PATH, DEFAULT_POLL_INTERVAL_MS, NotebookConfig};
pub use contents::JupyterContentsClient;
pub use memory::MemoryNotebookStore;
pub use store::{NotebookError, NotebookResult, NotebookStore};
pub use types::{
    CODE_CELL, CellSource, META_FUNCTION, META_NODE_ID, META_PARAMS, NotebookCell,
    NotebookContent, TdCell,
};
pub use watch::{NotebookWatch, SIGNATURE_SOURCE_CHARS, cell_signature, watch_notebook};
