use crate::{
    BackendResult, FunctionInfo, NlRequest, NlResponse, PreviewRequest, PreviewTable,
    SavedPipeline, User,
};

/// Searchable catalog of callable functions.
#[async_trait::async_trait]
pub trait FunctionCatalog: Send + Sync {
    async fn search_functions(&self, query: &str) -> BackendResult<Vec<FunctionInfo>>;

    /// Full definition of `name`, or `None` when the catalog does not know it.
    async fn function_detail(&self, name: &str) -> BackendResult<Option<FunctionInfo>>;
}

/// Execution, generation and persistence endpoints of the pipeline backend.
#[async_trait::async_trait]
pub trait PipelineBackend: Send + Sync {
    async fn run_preview(&self, request: PreviewRequest) -> BackendResult<PreviewTable>;

    async fn nl_to_yaml(&self, request: NlRequest) -> BackendResult<NlResponse>;

    async fn me(&self) -> BackendResult<User>;

    async fn list_pipelines(&self) -> BackendResult<Vec<SavedPipeline>>;

    async fn save_pipeline(&self, name: &str, yaml: &str) -> BackendResult<SavedPipeline>;
}
