use std::time::Duration;
use tdflow_spec::LayoutConfig;

pub const DEFAULT_PREVIEW_ROW_LIMIT: usize = 200;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1500;

/// Runtime configuration for an editor session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub preview_row_limit: usize,
    /// How long after a notebook push remote changes are treated as our own.
    pub settle_delay_ms: u64,
    pub layout: LayoutConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preview_row_limit: DEFAULT_PREVIEW_ROW_LIMIT,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            layout: LayoutConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |key: &str| lookup(key).and_then(|value| value.trim().parse::<u64>().ok());
        let defaults = Self::default();
        Self {
            preview_row_limit: number("TDFLOW_PREVIEW_ROWS")
                .map(|rows| rows as usize)
                .unwrap_or(defaults.preview_row_limit),
            settle_delay_ms: number("TDFLOW_SETTLE_MS").unwrap_or(defaults.settle_delay_ms),
            layout: defaults.layout,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults_match_editor_baseline() {
        let config = SessionConfig::default();
        assert_eq!(config.preview_row_limit, 200);
        assert_eq!(config.settle_delay(), Duration::from_millis(1500));
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn from_lookup_unparseable_expected_defaults() {
        let config = SessionConfig::from_lookup(|key| match key {
            "TDFLOW_PREVIEW_ROWS" => Some("50".to_string()),
            "TDFLOW_SETTLE_MS" => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config.preview_row_limit, 50);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
    }
}
