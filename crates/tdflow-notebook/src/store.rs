use crate::NotebookContent;

#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("notebook request failed: {0}")]
    Transport(String),

    #[error("notebook server returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("path is not a notebook: {0}")]
    NotANotebook(String),

    #[error("notebook decode failed: {0}")]
    Decode(String),

    #[error("invalid notebook url: {0}")]
    InvalidUrl(String),

    #[error("notebook store failure: {0}")]
    Backend(String),
}

pub type NotebookResult<T> = Result<T, NotebookError>;

/// Whole-document access to notebooks by path.
#[async_trait::async_trait]
pub trait NotebookStore: Send + Sync {
    /// `None` when no notebook exists at `path`.
    async fn load(&self, path: &str) -> NotebookResult<Option<NotebookContent>>;

    async fn save(&self, path: &str, content: &NotebookContent) -> NotebookResult<()>;
}
