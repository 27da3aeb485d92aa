use super::{cds::CdsConfig, http::HttpConfig, path::PathConfig, path::BASE_DIR_ENV, traits::ConfigSection};
use crate::error::AatoolboxError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `AATOOLBOX__HTTP__TIMEOUT_SECS=60`
pub const ENV_PREFIX: &str = "AATOOLBOX";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub path: PathConfig,
    pub http: HttpConfig,
    pub cds: CdsConfig,
}

impl AppConfig {
    /// Layer defaults, an optional TOML file and `AATOOLBOX__*` variables.
    /// `AA_DATA_DIR` always wins for the base directory.
    pub fn load(file: Option<&Path>) -> Result<Self, AatoolboxError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        if let Some(base_dir) = std::env::var_os(BASE_DIR_ENV) {
            config.path.base_dir = base_dir.into();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AatoolboxError> {
        self.path.validate().map_err(section_error::<PathConfig>)?;
        self.http.validate().map_err(section_error::<HttpConfig>)?;
        self.cds.validate().map_err(section_error::<CdsConfig>)?;
        Ok(())
    }
}

fn section_error<S: ConfigSection>(err: AatoolboxError) -> AatoolboxError {
    match err {
        AatoolboxError::Configuration(msg) => {
            AatoolboxError::Configuration(format!("[{}] {}", S::section_name(), msg))
        }
        other => other,
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AatoolboxError> {
        let toml_str = self.to_toml()?;
        std::fs::write(path, toml_str)
            .map_err(|e| AatoolboxError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, AatoolboxError> {
        let config = self.config.read().unwrap_or_else(|e| e.into_inner());
        toml::to_string_pretty(&*config)
            .map_err(|e| AatoolboxError::Configuration(format!("Failed to serialize: {}", e)))
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply `f` and keep the result only if it validates
    pub fn update<F>(&self, f: F) -> Result<(), AatoolboxError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = config.clone();
        f(&mut updated);
        updated.validate()?;
        *config = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        ConfigManager::new(AppConfig {
            path: PathConfig::with_base_dir("/tmp/aa"),
            ..AppConfig::default()
        })
    }

    #[test]
    fn test_saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aatoolbox.toml");
        let manager = manager();
        manager
            .update(|c| c.http.timeout_secs = 42)
            .unwrap();
        manager.save_to_file(&path).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.http.timeout_secs, 42);
        if std::env::var_os(BASE_DIR_ENV).is_none() {
            assert_eq!(loaded.path.base_dir, Path::new("/tmp/aa"));
        }
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aatoolbox.toml");
        manager().save_to_file(&path).unwrap();

        std::env::set_var("AATOOLBOX__HTTP__USER_AGENT", "aatoolbox-env-test");
        let loaded = AppConfig::load(Some(&path));
        std::env::remove_var("AATOOLBOX__HTTP__USER_AGENT");

        assert_eq!(loaded.unwrap().http.user_agent, "aatoolbox-env-test");
    }

    #[test]
    fn test_invalid_update_is_discarded() {
        let manager = manager();
        let result = manager.update(|c| c.http.timeout_secs = 0);
        assert!(result.is_err());
        assert_eq!(manager.get().http.timeout_secs, HttpConfig::default().timeout_secs);
    }

    #[test]
    fn test_section_name_in_error() {
        let mut config = AppConfig {
            path: PathConfig::with_base_dir("/tmp/aa"),
            ..AppConfig::default()
        };
        config.http.timeout_secs = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("[http]"));
    }
}
