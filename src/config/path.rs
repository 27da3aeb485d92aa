use super::traits::ConfigSection;
use crate::error::AatoolboxError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable pointing at the root of the data directory
pub const BASE_DIR_ENV: &str = "AA_DATA_DIR";

/// Directory layout of the data store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub base_dir: PathBuf,
    pub public: String,
    pub private: String,
    pub raw: String,
    pub processed: String,
    /// Directory name used instead of the ISO3 for datasets stored globally
    pub global: String,
    /// Where `<iso3>.toml` country configurations are looked up
    pub countries_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::new(),
            public: "public".to_string(),
            private: "private".to_string(),
            raw: "raw".to_string(),
            processed: "processed".to_string(),
            global: "glb".to_string(),
            countries_dir: PathBuf::from("countries"),
        }
    }
}

impl PathConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

impl ConfigSection for PathConfig {
    fn section_name() -> &'static str {
        "path"
    }

    fn validate(&self) -> Result<(), AatoolboxError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(AatoolboxError::MissingEnv(BASE_DIR_ENV));
        }
        let names = [&self.public, &self.private, &self.raw, &self.processed, &self.global];
        if names.iter().any(|name| name.is_empty()) {
            return Err(AatoolboxError::Configuration(
                "Directory names must not be empty".to_string(),
            ));
        }
        if self.public == self.private || self.raw == self.processed {
            return Err(AatoolboxError::Configuration(
                "public/private and raw/processed directories must differ".to_string(),
            ));
        }
        Ok(())
    }
}
