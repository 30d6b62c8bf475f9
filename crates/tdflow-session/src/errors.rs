use tdflow_backend::BackendError;
use tdflow_notebook::NotebookError;
use tdflow_spec::SpecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("node document for '{0}' is not valid or does not define that node")]
    InvalidNodeDocument(String),
    #[error("the pipeline has no nodes")]
    EmptyPipeline,
    #[error("a pipeline name is required")]
    MissingName,
    #[error("a prompt is required")]
    MissingPrompt,
    #[error("no pipeline block found in the pasted text")]
    NoPipelineBlock,
    #[error("local storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Message for display. Backend failures are cut the same way the
    /// backend client cuts them.
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}
