use crate::config::ReportingPoint;
use crate::error::{AatoolboxError, Result};
use chrono::NaiveDateTime;
use polars::prelude::*;

/// Ensemble member coordinate of a grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Members {
    /// No ensemble, e.g. the reanalysis
    None,
    /// A single member held as a scalar coordinate, e.g. the control forecast
    Scalar(i64),
    Axis(Vec<i64>),
}

impl Members {
    fn len(&self) -> usize {
        match self {
            Self::None | Self::Scalar(_) => 1,
            Self::Axis(numbers) => numbers.len(),
        }
    }
}

/// River discharge (`dis24`) on a regular lat/lon grid.
///
/// Values are stored row-major over `(number, time, step, latitude, longitude)`,
/// where `number` and `step` have length one when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct DischargeGrid {
    pub members: Members,
    pub time: Vec<NaiveDateTime>,
    /// Forecast steps in hours
    pub step: Option<Vec<u32>>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub dis24: Vec<f64>,
}

impl DischargeGrid {
    pub fn new(
        members: Members,
        time: Vec<NaiveDateTime>,
        step: Option<Vec<u32>>,
        latitude: Vec<f64>,
        longitude: Vec<f64>,
        dis24: Vec<f64>,
    ) -> Result<Self> {
        let grid = Self {
            members,
            time,
            step,
            latitude,
            longitude,
            dis24,
        };
        let expected = grid.members.len() * grid.time.len() * grid.n_steps() * grid.latitude.len() * grid.longitude.len();
        if grid.dis24.len() != expected {
            return Err(AatoolboxError::Processing(format!(
                "Discharge grid has {} values but its coordinates span {}",
                grid.dis24.len(),
                expected
            )));
        }
        if grid.latitude.is_empty() || grid.longitude.is_empty() {
            return Err(AatoolboxError::Processing("Discharge grid has no cells".to_string()));
        }
        Ok(grid)
    }

    fn n_steps(&self) -> usize {
        self.step.as_ref().map_or(1, Vec::len)
    }

    /// Promote a scalar member to a length-one member axis so it can be
    /// combined with other members. Grids that already have an axis are
    /// returned unchanged.
    pub fn expand_members(mut self) -> Result<Self> {
        self.members = match self.members {
            Members::Scalar(number) => Members::Axis(vec![number]),
            Members::Axis(numbers) => Members::Axis(numbers),
            Members::None => {
                return Err(AatoolboxError::Processing(
                    "Grid has no ensemble member coordinate to expand".to_string(),
                ))
            }
        };
        Ok(self)
    }

    /// Concatenate two ensembles over the member axis, ordered by member number
    pub fn combine_members(a: Self, b: Self) -> Result<Self> {
        let (Members::Axis(a_numbers), Members::Axis(b_numbers)) = (&a.members, &b.members) else {
            return Err(AatoolboxError::Processing(
                "Both grids need a member axis to be combined".to_string(),
            ));
        };
        if a.time != b.time || a.step != b.step || a.latitude != b.latitude || a.longitude != b.longitude {
            return Err(AatoolboxError::Processing(
                "Cannot combine grids with different coordinates".to_string(),
            ));
        }

        let a_first = if a_numbers.last() < b_numbers.first() {
            true
        } else if b_numbers.last() < a_numbers.first() {
            false
        } else {
            return Err(AatoolboxError::Processing(
                "Ensemble member numbers overlap".to_string(),
            ));
        };
        let (first, second) = if a_first { (a, b) } else { (b, a) };

        let Members::Axis(mut numbers) = first.members else {
            return Err(AatoolboxError::Processing("Missing member axis".to_string()));
        };
        if let Members::Axis(more) = second.members {
            numbers.extend(more);
        }
        let mut dis24 = first.dis24;
        dis24.extend(second.dis24);

        Self::new(
            Members::Axis(numbers),
            first.time,
            first.step,
            first.latitude,
            first.longitude,
            dis24,
        )
    }

    /// Concatenate grids over time, e.g. one grid per downloaded year
    pub fn concat_time(grids: Vec<Self>) -> Result<Self> {
        let mut grids = grids.into_iter();
        let Some(mut combined) = grids.next() else {
            return Err(AatoolboxError::Processing("No grids to concatenate".to_string()));
        };
        for grid in grids {
            if grid.members != combined.members
                || grid.step != combined.step
                || grid.latitude != combined.latitude
                || grid.longitude != combined.longitude
            {
                return Err(AatoolboxError::Processing(
                    "Cannot concatenate grids with different coordinates".to_string(),
                ));
            }
            let block = combined.n_steps() * combined.latitude.len() * combined.longitude.len();
            let mut dis24 = Vec::with_capacity(combined.dis24.len() + grid.dis24.len());
            let (n_a, n_b) = (combined.time.len(), grid.time.len());
            for m in 0..combined.members.len() {
                dis24.extend_from_slice(&combined.dis24[m * n_a * block..(m + 1) * n_a * block]);
                dis24.extend_from_slice(&grid.dis24[m * n_b * block..(m + 1) * n_b * block]);
            }
            combined.time.extend(grid.time);
            combined.dis24 = dis24;
        }
        Ok(combined)
    }

    /// Nearest grid cell to a reporting point, which must lie strictly inside
    /// the grid's extent
    fn nearest_cell(&self, point: &ReportingPoint) -> Result<(usize, usize)> {
        let lat = nearest_index(&self.latitude, point.lat, "lat", &point.name)?;
        let lon = nearest_index(&self.longitude, point.lon, "lon", &point.name)?;
        Ok((lat, lon))
    }

    /// Discharge time series at each reporting point
    pub fn reporting_point_frame(&self, points: &[ReportingPoint]) -> Result<DataFrame> {
        let n_members = self.members.len();
        let n_time = self.time.len();
        let n_steps = self.n_steps();
        let (n_lat, n_lon) = (self.latitude.len(), self.longitude.len());
        let rows = n_members * n_time * n_steps;

        let mut columns = Vec::new();
        if let Members::Axis(numbers) = &self.members {
            let number: Vec<i64> = (0..rows).map(|r| numbers[r / (n_time * n_steps)]).collect();
            columns.push(Column::new("number".into(), number));
        }
        let time: Vec<String> = (0..rows)
            .map(|r| self.time[(r / n_steps) % n_time].format("%Y-%m-%dT%H:%M:%S").to_string())
            .collect();
        columns.push(Column::new("time".into(), time));
        if let Some(steps) = &self.step {
            let step: Vec<i64> = (0..rows).map(|r| i64::from(steps[r % n_steps])).collect();
            columns.push(Column::new("step".into(), step));
        }

        for point in points {
            let (lat, lon) = self.nearest_cell(point)?;
            let values: Vec<f64> = (0..rows)
                .map(|r| self.dis24[(r * n_lat + lat) * n_lon + lon])
                .collect();
            columns.push(Column::new(point.name.as_str().into(), values));
        }

        Ok(DataFrame::new(columns)?)
    }
}

fn nearest_index(coords: &[f64], value: f64, axis: &'static str, name: &str) -> Result<usize> {
    let min = coords.iter().copied().fold(f64::INFINITY, f64::min);
    let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(min < value && value < max) {
        return Err(AatoolboxError::OutOfBounds {
            name: name.to_string(),
            axis,
            value,
            min,
            max,
        });
    }
    coords
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
        .map(|(i, _)| i)
        .ok_or_else(|| AatoolboxError::Processing(format!("Empty {} coordinate", axis)))
}
