use super::traits::ConfigSection;
use crate::error::AatoolboxError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CDS_URL_ENV: &str = "CDSAPI_URL";
pub const CDS_KEY_ENV: &str = "CDSAPI_KEY";
pub const CDS_RC_ENV: &str = "CDSAPI_RC";

/// Climate Data Store API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdsConfig {
    pub url: Option<String>,
    pub key: Option<String>,
    /// Longest wait between two polls of a queued request
    pub max_poll_secs: u64,
}

impl Default for CdsConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            max_poll_secs: 120,
        }
    }
}

/// Resolved URL and `UID:KEY` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdsCredentials {
    pub url: String,
    pub key: String,
}

impl CdsCredentials {
    /// Split the key into the basic auth user and password
    pub fn basic_auth(&self) -> Result<(&str, &str), AatoolboxError> {
        self.key
            .split_once(':')
            .ok_or_else(|| AatoolboxError::Configuration("CDS key must have the form UID:KEY".to_string()))
    }
}

impl CdsConfig {
    /// Resolve credentials from this section, then `CDSAPI_URL`/`CDSAPI_KEY`,
    /// then the `.cdsapirc` file.
    pub fn credentials(&self) -> Result<CdsCredentials, AatoolboxError> {
        let mut url = self.url.clone().or_else(|| std::env::var(CDS_URL_ENV).ok());
        let mut key = self.key.clone().or_else(|| std::env::var(CDS_KEY_ENV).ok());

        if url.is_none() || key.is_none() {
            if let Some(rc_path) = rc_path() {
                if rc_path.is_file() {
                    let (rc_url, rc_key) = read_rc(&rc_path)?;
                    url = url.or(rc_url);
                    key = key.or(rc_key);
                }
            }
        }

        match (url, key) {
            (Some(url), Some(key)) => Ok(CdsCredentials {
                url: url.trim_end_matches('/').to_string(),
                key,
            }),
            _ => Err(AatoolboxError::Configuration(
                "Missing CDS API url/key: set them in the config, CDSAPI_URL/CDSAPI_KEY, or ~/.cdsapirc".to_string(),
            )),
        }
    }
}

fn rc_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CDS_RC_ENV) {
        return Some(PathBuf::from(path));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cdsapirc"))
}

/// Parse `url:` and `key:` lines of a `.cdsapirc` file
pub fn read_rc(path: &Path) -> Result<(Option<String>, Option<String>), AatoolboxError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_rc(&contents))
}

fn parse_rc(contents: &str) -> (Option<String>, Option<String>) {
    let mut url = None;
    let mut key = None;
    for line in contents.lines() {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim().to_string();
            match name.trim() {
                "url" => url = Some(value),
                "key" => key = Some(value),
                _ => {}
            }
        }
    }
    (url, key)
}

impl ConfigSection for CdsConfig {
    fn section_name() -> &'static str {
        "cds"
    }

    fn validate(&self) -> Result<(), AatoolboxError> {
        if self.max_poll_secs == 0 {
            return Err(AatoolboxError::Configuration(
                "CDS poll interval must be positive".to_string(),
            ));
        }
        if let Some(key) = &self.key {
            if !key.contains(':') {
                return Err(AatoolboxError::Configuration(
                    "CDS key must have the form UID:KEY".to_string(),
                ));
            }
        }
        Ok(())
    }
}
