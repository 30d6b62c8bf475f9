pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 150;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub search_debounce_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            token: None,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
        }
    }
}

impl BackendConfig {
    /// Reads `TDFLOW_API_BASE` and `TDFLOW_API_TOKEN`; blank values fall back
    /// to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            base_url: read("TDFLOW_API_BASE").unwrap_or(defaults.base_url),
            token: read("TDFLOW_API_TOKEN"),
            search_debounce_ms: read("TDFLOW_SEARCH_DEBOUNCE_MS")
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(defaults.search_debounce_ms),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.trim().is_empty());
        self
    }
}
