use super::cds::CdsRetrieve;
use super::decoder::{GribDecoder, MessageKind};
use super::grid::DischargeGrid;
use super::product::GlofasProduct;
use crate::config::{CountryConfig, PathConfig};
use crate::data::CsvStore;
use crate::datasources::datasource::{check_file_existence, ensure_parent, DataSource};
use crate::error::{AatoolboxError, Result};
use crate::http::DownloadProgress;
use crate::utils::GeoBoundingBox;
use polars::prelude::DataFrame;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

const MODULE_BASENAME: &str = "glofas";
const HYDROLOGICAL_MODEL: &str = "lisflood";
const RIVER_DISCHARGE_VARIABLE: &str = "river_discharge_in_the_last_24_hours";

/// Years and lead time of a download or processing run. Unset years default
/// to the product's full range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlofasRequest {
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    /// In days
    pub leadtime_max: Option<u32>,
}

impl GlofasRequest {
    pub fn years(year_min: i32, year_max: i32) -> Self {
        Self {
            year_min: Some(year_min),
            year_max: Some(year_max),
            leadtime_max: None,
        }
    }

    pub fn with_leadtime(mut self, leadtime_max: u32) -> Self {
        self.leadtime_max = Some(leadtime_max);
        self
    }
}

/// Downloads and processes one GloFAS product for a country and area
pub struct Glofas {
    source: DataSource,
    product: GlofasProduct,
    geo_bounding_box: GeoBoundingBox,
}

impl Glofas {
    pub fn new(
        paths: &PathConfig,
        country_config: CountryConfig,
        product: GlofasProduct,
        mut geo_bounding_box: GeoBoundingBox,
    ) -> Result<Self> {
        geo_bounding_box.validate()?;
        // The GloFAS API on CDS requires coordinates of the form x.x5
        geo_bounding_box.round_coords(0.05, 0.1);
        Ok(Self {
            source: DataSource::new(paths, country_config, MODULE_BASENAME, true, false),
            product,
            geo_bounding_box,
        })
    }

    pub fn product(&self) -> GlofasProduct {
        self.product
    }

    pub fn geo_bounding_box(&self) -> &GeoBoundingBox {
        &self.geo_bounding_box
    }

    /// CDS request for one year, optionally restricted to one month
    pub fn get_query(&self, year: i32, month: Option<u32>, leadtime_max: Option<u32>) -> Value {
        let prefix = self.product.date_variable_prefix();
        let bbox = &self.geo_bounding_box;

        let mut query = Map::new();
        query.insert("variable".to_string(), json!(RIVER_DISCHARGE_VARIABLE));
        query.insert("format".to_string(), json!("grib"));
        query.insert(
            self.product.dataset_variable_name().to_string(),
            json!(self.product.dataset()),
        );
        query.insert(format!("{}year", prefix), json!(year.to_string()));
        let months = match month {
            Some(month) => json!(format!("{:02}", month)),
            None => json!((1..=12).map(|m| format!("{:02}", m)).collect::<Vec<_>>()),
        };
        query.insert(format!("{}month", prefix), months);
        query.insert(
            format!("{}day", prefix),
            json!((1..=31).map(|d| format!("{:02}", d)).collect::<Vec<_>>()),
        );
        query.insert(
            "geo_bounding_box".to_string(),
            json!([bbox.north, bbox.west, bbox.south, bbox.east]),
        );
        query.insert("system_version".to_string(), json!(self.product.system_version()));
        query.insert("hydrological_model".to_string(), json!(HYDROLOGICAL_MODEL));
        if let Some(leadtime_max) = leadtime_max {
            let hours: Vec<String> = (1..=leadtime_max).map(|d| (d * 24).to_string()).collect();
            query.insert("leadtime_hour".to_string(), json!(hours));
        }
        log::debug!("Query: {}", Value::Object(query.clone()));
        Value::Object(query)
    }

    pub fn raw_filepath(&self, year: i32, month: Option<u32>, leadtime_max: Option<u32>) -> PathBuf {
        let cds_name = self.product.cds_name();
        let mut filename = format!("{}_{}_{}", self.source.iso3(), cds_name, year);
        if let Some(month) = month {
            filename.push_str(&format!("-{:02}", month));
        }
        if let Some(leadtime_max) = leadtime_max {
            filename.push_str(&format!("_ltmax{:02}d", leadtime_max));
        }
        filename.push_str(&format!("_{}.grib", self.geo_bounding_box.get_filename_repr(1)));
        self.source.raw_base_dir().join(cds_name).join(filename)
    }

    /// Processed table of one year range. Different ranges and lead times
    /// never share a file.
    pub fn processed_filepath(&self, year_min: i32, year_max: i32, leadtime_max: Option<u32>) -> PathBuf {
        let mut filename = format!(
            "{}_{}_{}-{}",
            self.source.iso3(),
            self.product.cds_name(),
            year_min,
            year_max
        );
        if let Some(leadtime_max) = leadtime_max {
            filename.push_str(&format!("_ltmax{:02}d", leadtime_max));
        }
        filename.push_str(&format!("_{}.csv", self.geo_bounding_box.get_filename_repr(1)));
        self.source.processed_base_dir().join(filename)
    }

    /// Resolve defaults and check the request against the product
    fn resolve(&self, request: &GlofasRequest) -> Result<(i32, i32, Option<u32>)> {
        let year_min = request.year_min.unwrap_or_else(|| self.product.year_min());
        let year_max = request.year_max.unwrap_or_else(|| self.product.year_max());
        if year_min > year_max {
            return Err(AatoolboxError::Configuration(format!(
                "year_min ({}) is after year_max ({})",
                year_min, year_max
            )));
        }
        // CDS itself rejects years it does not hold
        if year_min < self.product.year_min() || year_max > self.product.year_max() {
            log::warn!(
                "GloFAS {} is documented from {} to {}, requested {} to {}",
                self.product,
                self.product.year_min(),
                self.product.year_max(),
                year_min,
                year_max
            );
        }

        match (self.product.max_leadtime(), request.leadtime_max) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(AatoolboxError::Configuration(format!(
                    "GloFAS {} has no lead time",
                    self.product
                )))
            }
            (Some(_), None) => {
                return Err(AatoolboxError::Configuration(format!(
                    "GloFAS {} requires leadtime_max",
                    self.product
                )))
            }
            (Some(max), Some(leadtime)) if leadtime == 0 || leadtime > max => {
                return Err(AatoolboxError::Configuration(format!(
                    "leadtime_max must be between 1 and {} days, got {}",
                    max, leadtime
                )))
            }
            (Some(_), Some(_)) => {}
        }
        Ok((year_min, year_max, request.leadtime_max))
    }

    /// Retrieve one raw GRIB file per year
    pub fn download(
        &self,
        client: &dyn CdsRetrieve,
        request: &GlofasRequest,
        clobber: bool,
        progress: &mut dyn DownloadProgress,
    ) -> Result<Vec<PathBuf>> {
        let (year_min, year_max, leadtime_max) = self.resolve(request)?;
        let total = (year_max - year_min + 1) as usize;
        let mut paths = Vec::with_capacity(total);

        for (i, year) in (year_min..=year_max).enumerate() {
            let current = i + 1;
            let filepath = self.raw_filepath(year, None, leadtime_max);
            if filepath.exists() && !clobber {
                progress.on_skipped(current, total, &filepath, "already exists");
                paths.push(filepath);
                continue;
            }
            progress.on_start(current, total, &filepath);
            let path = check_file_existence(&filepath, clobber, |target| {
                ensure_parent(target)?;
                log::debug!("Querying for {}...", target.display());
                let query = self.get_query(year, None, leadtime_max);
                client.retrieve(self.product.cds_name(), &query, target)?;
                log::debug!("...successfully downloaded {}", target.display());
                Ok(())
            })?;
            progress.on_complete(current, total, &path);
            paths.push(path);
        }
        Ok(paths)
    }

    /// Extract reporting point discharge from the raw files and write the
    /// processed CSV
    pub fn process(
        &self,
        decoder: &dyn GribDecoder,
        request: &GlofasRequest,
        clobber: bool,
    ) -> Result<PathBuf> {
        let (year_min, year_max, leadtime_max) = self.resolve(request)?;
        let points = self
            .source
            .country_config()
            .glofas
            .as_ref()
            .map(|g| g.reporting_points.as_slice())
            .filter(|points| !points.is_empty())
            .ok_or_else(|| {
                AatoolboxError::Configuration(
                    "The country configuration does not contain any reporting point coordinates"
                        .to_string(),
                )
            })?;

        let processed = self.processed_filepath(year_min, year_max, leadtime_max);
        check_file_existence(&processed, clobber, |target| {
            let raw_paths = (year_min..=year_max)
                .map(|year| {
                    let path = self.raw_filepath(year, None, leadtime_max);
                    if path.is_file() {
                        Ok(path)
                    } else {
                        Err(AatoolboxError::FileNotFound {
                            path,
                            hint: "Make sure that you have called download() for this year.".to_string(),
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            let grid = self.read_raw(decoder, &raw_paths)?;
            let mut df = grid.reporting_point_frame(points)?;
            CsvStore::save(target, &mut df)
        })
    }

    /// Decode each yearly file, then join the years along time
    fn read_raw(&self, decoder: &dyn GribDecoder, paths: &[PathBuf]) -> Result<DischargeGrid> {
        let grids = paths
            .iter()
            .map(|path| {
                log::debug!("Reading {}", path.display());
                if !self.product.is_ensemble() {
                    return decoder.decode(path, MessageKind::All);
                }
                let control = decoder.decode(path, MessageKind::Control)?.expand_members()?;
                let perturbed = decoder.decode(path, MessageKind::Perturbed)?;
                DischargeGrid::combine_members(control, perturbed)
            })
            .collect::<Result<Vec<_>>>()?;
        DischargeGrid::concat_time(grids)
    }

    /// Processed reporting point table of the request's years and lead time
    pub fn load(&self, request: &GlofasRequest) -> Result<DataFrame> {
        let (year_min, year_max, leadtime_max) = self.resolve(request)?;
        let path = self.processed_filepath(year_min, year_max, leadtime_max);
        CsvStore::load_and_validate(&path, &["time"]).map_err(|err| match err {
            AatoolboxError::FileNotFound { path, .. } => AatoolboxError::FileNotFound {
                path,
                hint: "Make sure that you have already called process().".to_string(),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glofas(product: GlofasProduct) -> Glofas {
        Glofas::new(
            &PathConfig::with_base_dir("/aa"),
            CountryConfig::new("abc").unwrap(),
            product,
            GeoBoundingBox::new(1.0, -2.2, 3.3, -4.4).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_raw_filepath() {
        let g = glofas(GlofasProduct::Forecast);
        assert_eq!(
            g.raw_filepath(2000, Some(3), Some(3)),
            PathBuf::from("/aa/public/raw/abc/glofas/cems-glofas-forecast/abc_cems-glofas-forecast_2000-03_ltmax03d_Np1d1Sm2d2Ep3d4Wm4d5.grib")
        );
    }

    #[test]
    fn test_processed_filepath() {
        let g = glofas(GlofasProduct::Reanalysis);
        assert_eq!(
            g.processed_filepath(1999, 2001, None),
            PathBuf::from("/aa/public/processed/abc/glofas/abc_cems-glofas-historical_1999-2001_Np1d1Sm2d2Ep3d4Wm4d5.csv")
        );
        let g = glofas(GlofasProduct::Reforecast);
        assert_eq!(
            g.processed_filepath(2000, 2000, Some(7)),
            PathBuf::from("/aa/public/processed/abc/glofas/abc_cems-glofas-reforecast_2000-2000_ltmax07d_Np1d1Sm2d2Ep3d4Wm4d5.csv")
        );
    }

    #[test]
    fn test_query_single_month() {
        let g = glofas(GlofasProduct::Forecast);
        let query = g.get_query(2021, Some(7), None);
        assert_eq!(query["month"], json!("07"));
        assert!(query.get("leadtime_hour").is_none());
    }

    #[test]
    fn test_request_validation() {
        let reanalysis = glofas(GlofasProduct::Reanalysis);
        assert!(reanalysis.resolve(&GlofasRequest::years(2000, 2000)).is_ok());
        assert!(reanalysis.resolve(&GlofasRequest::years(2000, 2000).with_leadtime(3)).is_err());
        // Outside the documented range only warns
        assert_eq!(
            reanalysis.resolve(&GlofasRequest::years(1970, 2000)).unwrap(),
            (1970, 2000, None)
        );
        assert!(reanalysis.resolve(&GlofasRequest::years(2001, 2000)).is_err());

        let forecast = glofas(GlofasProduct::Forecast);
        assert!(forecast.resolve(&GlofasRequest::years(2000, 2000).with_leadtime(3)).is_ok());

        let reforecast = glofas(GlofasProduct::Reforecast);
        assert!(reforecast.resolve(&GlofasRequest::years(2000, 2000)).is_err());
        assert!(reforecast.resolve(&GlofasRequest::years(2000, 2000).with_leadtime(47)).is_err());
        assert_eq!(
            reforecast.resolve(&GlofasRequest::default().with_leadtime(10)).unwrap(),
            (1999, 2018, Some(10))
        );
    }
}
