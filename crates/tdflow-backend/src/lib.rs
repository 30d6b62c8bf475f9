//! Clients for the pipeline backend: function catalog, preview runs,
//! natural-language generation and saved pipelines.

pub mod client;
pub mod config;
pub mod errors;
pub mod search;
pub mod traits;
pub mod types;

pub use client::BackendClient;
pub use config::{BackendConfig, DEFAULT_API_BASE, DEFAULT_SEARCH_DEBOUNCE_MS};
pub use errors::{BackendError, BackendResult, REQUIRES_RECEIVER_DETAIL, USER_MESSAGE_LIMIT};
pub use search::FunctionSearch;
pub use traits::{FunctionCatalog, PipelineBackend};
pub use types::{
    APPEND_MODE, FunctionInfo, FunctionParam, NlRequest, NlResponse, PreviewRequest,
    PreviewTable, SavedPipeline, UploadFile, User, sort_by_relevance,
};
