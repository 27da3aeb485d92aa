use super::geometry::Feature;
use super::geotiff::Raster;
use crate::error::{AatoolboxError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Mean,
    Std,
    Min,
    Max,
    Sum,
    Count,
}

impl Stat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Count => "count",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Mean, Self::Std, Self::Min, Self::Max, Self::Sum, Self::Count]
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stat {
    type Err = AatoolboxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .into_iter()
            .find(|stat| stat.as_str() == s)
            .ok_or_else(|| AatoolboxError::Configuration(format!("Unknown statistic '{}'", s)))
    }
}

/// Which statistics to compute per feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsOptions {
    pub stats: Vec<Stat>,
    pub percentiles: Vec<u32>,
    /// Pixel value treated as missing
    pub nodata: Option<f64>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            stats: Stat::all(),
            percentiles: Vec::new(),
            nodata: None,
        }
    }
}

impl StatsOptions {
    pub fn validate(&self) -> Result<()> {
        if self.stats.is_empty() && self.percentiles.is_empty() {
            return Err(AatoolboxError::Configuration(
                "At least one statistic or percentile is required".to_string(),
            ));
        }
        if let Some(p) = self.percentiles.iter().find(|&&p| p > 100) {
            return Err(AatoolboxError::Configuration(format!(
                "Percentile {} outside 0..=100",
                p
            )));
        }
        Ok(())
    }

    /// Output column names, in order: statistics then `{p}quant`
    pub fn column_names(&self) -> Vec<String> {
        self.stats
            .iter()
            .map(|s| s.as_str().to_string())
            .chain(self.percentiles.iter().map(|p| format!("{}quant", p)))
            .collect()
    }
}

/// Statistics of one feature, aligned with [`StatsOptions::column_names`]
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalStats {
    pub feature: String,
    pub values: Vec<Option<f64>>,
}

/// Zonal statistics of `raster` over every feature.
///
/// A pixel belongs to a feature when its centre falls inside the geometry.
pub fn compute_raster_stats(raster: &Raster, features: &[Feature], options: &StatsOptions) -> Vec<ZonalStats> {
    features
        .par_iter()
        .map(|feature| {
            let mut pixels = feature_pixels(raster, feature, options.nodata);
            pixels.sort_by(|a, b| a.total_cmp(b));
            ZonalStats {
                feature: feature.id.clone(),
                values: summarise(&pixels, options),
            }
        })
        .collect()
}

fn feature_pixels(raster: &Raster, feature: &Feature, nodata: Option<f64>) -> Vec<f64> {
    let Some((min_x, min_y, max_x, max_y)) = feature.geometry.bounds() else {
        return Vec::new();
    };
    let t = &raster.transform;
    let col_range = index_range((min_x - t.origin_x) / t.pixel_width, (max_x - t.origin_x) / t.pixel_width, raster.width);
    let row_range = index_range((t.origin_y - max_y) / t.pixel_height, (t.origin_y - min_y) / t.pixel_height, raster.height);

    let mut pixels = Vec::new();
    for row in row_range {
        for col in col_range.clone() {
            let (x, y) = t.pixel_centre(col, row);
            if !feature.geometry.contains(x, y) {
                continue;
            }
            if let Some(value) = raster.get(col, row) {
                if value.is_nan() || nodata == Some(value) {
                    continue;
                }
                pixels.push(value);
            }
        }
    }
    pixels
}

fn index_range(start: f64, end: f64, len: usize) -> std::ops::Range<usize> {
    let lo = start.floor().max(0.0) as usize;
    let hi = (end.ceil().max(0.0) as usize).min(len);
    lo.min(hi)..hi
}

/// `sorted` must be in ascending order
fn summarise(sorted: &[f64], options: &StatsOptions) -> Vec<Option<f64>> {
    let count = sorted.len();
    let sum: f64 = sorted.iter().sum();
    let mean = (count > 0).then(|| sum / count as f64);

    let mut values: Vec<Option<f64>> = options
        .stats
        .iter()
        .map(|stat| match stat {
            Stat::Mean => mean,
            Stat::Std => mean.map(|m| {
                let var = sorted.iter().map(|v| (v - m).powi(2)).sum::<f64>() / count as f64;
                var.sqrt()
            }),
            Stat::Min => sorted.first().copied(),
            Stat::Max => sorted.last().copied(),
            Stat::Sum => (count > 0).then_some(sum),
            Stat::Count => Some(count as f64),
        })
        .collect();

    values.extend(options.percentiles.iter().map(|&p| percentile(sorted, p)));
    values
}

/// Linear interpolation between closest ranks
fn percentile(sorted: &[f64], p: u32) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = f64::from(p) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lower = sorted.get(lo)?;
    let upper = sorted.get(hi)?;
    Some(lower + (upper - lower) * (rank - lo as f64))
}
