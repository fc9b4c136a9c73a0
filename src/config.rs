//! Tunables for the workflow services.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Configuration shared by the workflow services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Page size used when a list request leaves it at zero
    pub default_page_size: u32,

    /// Upper bound on any requested page size
    pub max_page_size: u32,

    /// How far in the past (seconds) a new exhibition's registration start may lie.
    /// Absorbs clock skew between the caller and this service.
    pub registration_start_tolerance_secs: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            registration_start_tolerance_secs: 60, // 1 minute
        }
    }
}

impl WorkflowConfig {
    pub fn registration_start_tolerance(&self) -> Duration {
        Duration::seconds(self.registration_start_tolerance_secs.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: WorkflowConfig = serde_json::from_str(r#"{"max_page_size": 50}"#).unwrap();
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.registration_start_tolerance(), Duration::seconds(60));
    }

    #[test]
    fn negative_tolerance_is_treated_as_zero() {
        let config = WorkflowConfig {
            registration_start_tolerance_secs: -5,
            ..Default::default()
        };
        assert_eq!(config.registration_start_tolerance(), Duration::zero());
    }
}
