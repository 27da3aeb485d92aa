use crate::error::AatoolboxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// NDVI products published by USGS FEWS NET from eMODIS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdviProduct {
    /// Temporally smoothed NDVI
    Smoothed,
    /// NDVI as a percent of the median
    PercentMedian,
    /// Difference from the median
    MedianAnomaly,
    /// Difference from the previous year
    YearDifference,
}

impl NdviProduct {
    pub fn all() -> [Self; 4] {
        [Self::Smoothed, Self::PercentMedian, Self::MedianAnomaly, Self::YearDifference]
    }

    /// Name used in processed file names
    pub fn data_variable(&self) -> &'static str {
        match self {
            Self::Smoothed => "smoothed",
            Self::PercentMedian => "percent_median",
            Self::MedianAnomaly => "median_anomaly",
            Self::YearDifference => "year_difference",
        }
    }

    /// Path segment on the USGS server
    pub fn data_variable_url(&self) -> &'static str {
        match self {
            Self::Smoothed => "temporallysmoothedndvi",
            Self::PercentMedian => "percentofmedian",
            Self::MedianAnomaly => "mediananomaly",
            Self::YearDifference => "differenceprevyear",
        }
    }

    /// Suffix of the raw file names
    pub fn data_variable_suffix(&self) -> &'static str {
        match self {
            Self::Smoothed => "",
            Self::PercentMedian => "pmedian",
            Self::MedianAnomaly => "stmdn",
            Self::YearDifference => "dif",
        }
    }
}

impl fmt::Display for NdviProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.data_variable())
    }
}

impl FromStr for NdviProduct {
    type Err = AatoolboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|p| p.data_variable() == s)
            .ok_or_else(|| AatoolboxError::Configuration(format!("Unknown NDVI product '{}'", s)))
    }
}
