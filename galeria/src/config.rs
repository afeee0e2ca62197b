use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routes::RESULTS_PATH;
use crate::GaleriaError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub redirect_delay_ms: u64,
    pub total_items: u32,
    /// Stop polling after this many failed ticks in a row; `None` polls forever.
    pub max_consecutive_errors: Option<u32>,
    /// Per-request timeout for the terminal client.
    pub request_timeout_ms: Option<u64>,
    pub results_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            poll_interval_ms: 1000,
            redirect_delay_ms: 1000,
            total_items: 7,
            max_consecutive_errors: None,
            request_timeout_ms: None,
            results_path: RESULTS_PATH.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(text: &str) -> Result<Self, GaleriaError> {
        let config: ClientConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GaleriaError> {
        if self.poll_interval_ms == 0 {
            return Err(GaleriaError::InvalidParameter(
                "poll_interval_ms must be positive".into(),
            ));
        }
        if self.total_items == 0 {
            return Err(GaleriaError::InvalidParameter(
                "total_items must be positive".into(),
            ));
        }
        if self.max_consecutive_errors == Some(0) {
            return Err(GaleriaError::InvalidParameter(
                "max_consecutive_errors must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ClientConfig::from_json_str(r#"{"base_url": "http://galerias.local"}"#).unwrap();
        assert_eq!(config.base_url, "http://galerias.local");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.total_items, 7);
        assert_eq!(config.max_consecutive_errors, None);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(ClientConfig::from_json_str(r#"{"poll_interval_ms": 0}"#).is_err());
        assert!(ClientConfig::from_json_str(r#"{"total_items": 0}"#).is_err());
        assert!(ClientConfig::from_json_str(r#"{"max_consecutive_errors": 0}"#).is_err());
    }
}
