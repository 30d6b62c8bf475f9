pub const DEFAULT_JUPYTER_URL: &str = "http://localhost:8888";
pub const DEFAULT_NOTEBOOK_PATH: &str = "Untitled1.ipynb";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotebookConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub path: String,
    pub poll_interval_ms: u64,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_JUPYTER_URL.to_string(),
            token: None,
            path: DEFAULT_NOTEBOOK_PATH.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl NotebookConfig {
    /// Reads `TDFLOW_JUPYTER_URL`, `TDFLOW_JUPYTER_TOKEN` and
    /// `TDFLOW_NOTEBOOK_PATH`; blank values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            base_url: read("TDFLOW_JUPYTER_URL").unwrap_or(defaults.base_url),
            token: read("TDFLOW_JUPYTER_TOKEN"),
            path: read("TDFLOW_NOTEBOOK_PATH").unwrap_or(defaults.path),
            poll_interval_ms: read("TDFLOW_NOTEBOOK_POLL_MS")
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(defaults.poll_interval_ms),
        }
    }
}
