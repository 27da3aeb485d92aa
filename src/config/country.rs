use crate::error::{AatoolboxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::path::PathConfig;

/// FEWS NET areas for which USGS publishes eMODIS NDVI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsgsNdviAreaName {
    NorthAfrica,
    EastAfrica,
    SouthernAfrica,
    WestAfrica,
    CentralAsia,
    Yemen,
    CentralAmerica,
    Hispaniola,
}

impl UsgsNdviAreaName {
    /// Path segment of the area on the USGS file server
    pub fn area_url(&self) -> &'static str {
        match self {
            Self::NorthAfrica => "africa/north",
            Self::EastAfrica => "africa/east",
            Self::SouthernAfrica => "africa/southern",
            Self::WestAfrica => "africa/west",
            Self::CentralAsia => "asia/centralasia",
            Self::Yemen => "asia/middleeast/yemen",
            Self::CentralAmerica => "lac/camcar/centralamerica",
            Self::Hispaniola => "lac/camcar/caribbean/hispaniola",
        }
    }

    /// Prefix of the area's file names
    pub fn area_prefix(&self) -> &'static str {
        match self {
            Self::NorthAfrica => "na",
            Self::EastAfrica => "ea",
            Self::SouthernAfrica => "sa",
            Self::WestAfrica => "wa",
            Self::CentralAsia => "cta",
            Self::Yemen => "yem",
            Self::CentralAmerica => "ca",
            Self::Hispaniola => "hi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsgsNdviConfig {
    pub area_name: UsgsNdviAreaName,
}

/// A river gauge location where GloFAS discharge is extracted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingPoint {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlofasConfig {
    pub reporting_points: Vec<ReportingPoint>,
}

/// Per-country settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryConfig {
    pub iso3: String,
    #[serde(default)]
    pub usgs_ndvi: Option<UsgsNdviConfig>,
    #[serde(default)]
    pub glofas: Option<GlofasConfig>,
}

impl CountryConfig {
    pub fn new(iso3: &str) -> Result<Self> {
        let config = Self {
            iso3: iso3.to_ascii_lowercase(),
            usgs_ndvi: None,
            glofas: None,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: CountryConfig = toml::from_str(contents)
            .map_err(|e| AatoolboxError::Configuration(format!("Failed to parse country config: {}", e)))?;
        config.iso3 = config.iso3.to_ascii_lowercase();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AatoolboxError::Configuration(format!(
                "Failed to read country config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.iso3.len() != 3 || !self.iso3.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AatoolboxError::Configuration(format!(
                "ISO3 must be exactly 3 letters, got '{}'",
                self.iso3
            )));
        }
        if let Some(glofas) = &self.glofas {
            let mut names = HashSet::new();
            for point in &glofas.reporting_points {
                if point.name.is_empty() {
                    return Err(AatoolboxError::Configuration(
                        "Reporting point names must not be empty".to_string(),
                    ));
                }
                if !names.insert(point.name.as_str()) {
                    return Err(AatoolboxError::Configuration(format!(
                        "Duplicate reporting point '{}'",
                        point.name
                    )));
                }
                if !(-180.0..=180.0).contains(&point.lon) || !(-90.0..=90.0).contains(&point.lat) {
                    return Err(AatoolboxError::Configuration(format!(
                        "Reporting point '{}' has invalid coordinates ({}, {})",
                        point.name, point.lon, point.lat
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Load `<countries_dir>/<iso3>.toml`
pub fn create_country_config(iso3: &str, paths: &PathConfig) -> Result<CountryConfig> {
    let path = paths
        .countries_dir
        .join(format!("{}.toml", iso3.to_ascii_lowercase()));
    let config = CountryConfig::load_from_file(&path)?;
    if config.iso3 != iso3.to_ascii_lowercase() {
        return Err(AatoolboxError::Configuration(format!(
            "{} declares iso3 '{}', expected '{}'",
            path.display(),
            config.iso3,
            iso3
        )));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
iso3 = "ABC"

[usgs_ndvi]
area_name = "west_africa"

[glofas]
reporting_points = [
    { name = "station_1", lon = 0.55, lat = -0.85 },
    { name = "station_2", lon = 1.35, lat = 0.45 },
]
"#;

    #[test]
    fn test_parse_country_config() {
        let config = CountryConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.iso3, "abc");
        let ndvi = config.usgs_ndvi.unwrap();
        assert_eq!(ndvi.area_name.area_url(), "africa/west");
        assert_eq!(ndvi.area_name.area_prefix(), "wa");
        assert_eq!(config.glofas.unwrap().reporting_points.len(), 2);
    }

    #[test]
    fn test_invalid_iso3() {
        assert!(CountryConfig::new("ab").is_err());
        assert!(CountryConfig::new("a1c").is_err());
        assert_eq!(CountryConfig::new("BFA").unwrap().iso3, "bfa");
    }

    #[test]
    fn test_duplicate_reporting_points() {
        let contents = r#"
iso3 = "abc"
[glofas]
reporting_points = [
    { name = "a", lon = 0.0, lat = 0.0 },
    { name = "a", lon = 1.0, lat = 1.0 },
]
"#;
        assert!(CountryConfig::from_toml_str(contents).is_err());
    }
}
