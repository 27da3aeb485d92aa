use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AatoolboxError;

/// GloFAS datasets published on the Climate Data Store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlofasProduct {
    Reanalysis,
    Forecast,
    Reforecast,
}

impl GlofasProduct {
    /// Dataset name in CDS
    pub fn cds_name(&self) -> &'static str {
        match self {
            Self::Reanalysis => "cems-glofas-historical",
            Self::Forecast => "cems-glofas-forecast",
            Self::Reforecast => "cems-glofas-reforecast",
        }
    }

    pub fn system_version(&self) -> &'static str {
        match self {
            Self::Reanalysis | Self::Reforecast => "version_3_1",
            Self::Forecast => "operational",
        }
    }

    /// Query key under which [`Self::dataset`] is passed
    pub fn dataset_variable_name(&self) -> &'static str {
        match self {
            Self::Reanalysis => "dataset",
            Self::Forecast | Self::Reforecast => "product_type",
        }
    }

    pub fn dataset(&self) -> &'static [&'static str] {
        match self {
            Self::Reanalysis => &["consolidated_reanalysis"],
            Self::Forecast => &["control_forecast", "ensemble_perturbed_forecasts"],
            Self::Reforecast => &["control_reforecast", "ensemble_perturbed_reforecasts"],
        }
    }

    /// Some datasets prefix their date keys with `h`
    pub fn date_variable_prefix(&self) -> &'static str {
        match self {
            Self::Reanalysis | Self::Reforecast => "h",
            Self::Forecast => "",
        }
    }

    pub fn year_min(&self) -> i32 {
        match self {
            Self::Reanalysis => 1979,
            Self::Forecast => 2021,
            Self::Reforecast => 1999,
        }
    }

    pub fn year_max(&self) -> i32 {
        match self {
            Self::Reanalysis => 2022,
            Self::Forecast => Utc::now().year(),
            Self::Reforecast => 2018,
        }
    }

    /// Longest lead time in days, `None` for products without lead times
    pub fn max_leadtime(&self) -> Option<u32> {
        match self {
            Self::Reanalysis => None,
            Self::Forecast => Some(30),
            Self::Reforecast => Some(46),
        }
    }

    /// Forecast products hold a control run and perturbed ensemble members
    pub fn is_ensemble(&self) -> bool {
        self.max_leadtime().is_some()
    }
}

impl fmt::Display for GlofasProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reanalysis => "reanalysis",
            Self::Forecast => "forecast",
            Self::Reforecast => "reforecast",
        };
        f.write_str(name)
    }
}

impl FromStr for GlofasProduct {
    type Err = AatoolboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reanalysis" => Ok(Self::Reanalysis),
            "forecast" => Ok(Self::Forecast),
            "reforecast" => Ok(Self::Reforecast),
            other => Err(AatoolboxError::Configuration(format!(
                "Unknown GloFAS product '{}'",
                other
            ))),
        }
    }
}
