use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 500;

/// Analysis scheduling options, the `[analysis]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Gates every trigger.
    pub enabled: bool,
    /// Quiescence delay before a coalesced re-run starts.
    pub debounce_delay_ms: u64,
    /// Trigger paths with these extensions never start a run.
    pub banned_extensions: Vec<String>,
    /// Only analyze roots that contain C or C++ sources.
    pub require_sources: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            banned_extensions: vec!["md".to_string()],
            require_sources: false,
        }
    }
}

impl CoordinatorConfig {
    #[must_use]
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_value(serde_json::json!({ "debounce_delay_ms": 50 })).unwrap();
        assert!(config.enabled);
        assert_eq!(config.debounce_delay(), Duration::from_millis(50));
        assert_eq!(config.banned_extensions, vec!["md".to_string()]);
    }
}
