use super::traits::ConfigSection;
use crate::error::AatoolboxError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: format!("aatoolbox/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ConfigSection for HttpConfig {
    fn section_name() -> &'static str {
        "http"
    }

    fn validate(&self) -> Result<(), AatoolboxError> {
        if self.timeout_secs == 0 {
            return Err(AatoolboxError::Configuration(
                "HTTP timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
