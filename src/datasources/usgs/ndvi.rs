use super::product::NdviProduct;
use crate::config::{CountryConfig, PathConfig, UsgsNdviAreaName};
use crate::data::{CsvStore, RasterCache, RequiredColumn};
use crate::datasources::datasource::{ensure_parent, DataSource};
use crate::error::{AatoolboxError, Result};
use crate::http::{DownloadProgress, Fetch};
use crate::raster::{compute_raster_stats, Feature, Raster, StatsOptions, ZonalStats};
use crate::utils::dates::{expand_dekads, get_dekadal_date, DateInput, YearDekad};
use chrono::{NaiveDate, Utc};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ::zip::ZipArchive;

const MODULE_BASENAME: &str = "usgs_ndvi";
const BASE_URL: &str = "https://edcintl.cr.usgs.gov/downloads/sciweb1/shared/fews/web";
const RASTER_CACHE_CAPACITY: usize = 64;

/// Earliest dekad with eMODIS NDVI data
pub const EARLIEST_DEKAD: YearDekad = YearDekad { year: 2002, dekad: 19 };

/// NDVI raster of one dekad
#[derive(Debug, Clone)]
pub struct DekadRaster {
    pub year_dekad: YearDekad,
    pub date: NaiveDate,
    pub raster: Arc<Raster>,
}

/// Downloads and processes USGS FEWS NET eMODIS NDVI for a country.
///
/// Raw rasters cover a whole FEWS NET area and are shared between countries,
/// so they are stored under the global raw directory.
pub struct UsgsNdvi {
    source: DataSource,
    product: NdviProduct,
    area: UsgsNdviAreaName,
    start: YearDekad,
    end: YearDekad,
    cache: RasterCache,
}

impl UsgsNdvi {
    /// `start` defaults to the earliest available dekad and `end` to today's
    pub fn new(
        paths: &PathConfig,
        country_config: CountryConfig,
        product: NdviProduct,
        start: Option<&DateInput>,
        end: Option<&DateInput>,
    ) -> Result<Self> {
        let area = country_config
            .usgs_ndvi
            .as_ref()
            .map(|c| c.area_name)
            .ok_or_else(|| {
                AatoolboxError::Configuration(
                    "The country configuration does not contain any USGS NDVI area name".to_string(),
                )
            })?;

        let mut start = get_dekadal_date(start, EARLIEST_DEKAD)?;
        let end = get_dekadal_date(end, Utc::now().date_naive())?;
        if start < EARLIEST_DEKAD {
            log::warn!(
                "Start date is before earliest date data is available. Data will be downloaded from {}.",
                EARLIEST_DEKAD
            );
            start = EARLIEST_DEKAD;
        }
        if start > end {
            return Err(AatoolboxError::InvalidDate(format!(
                "start ({}) is after end ({})",
                start, end
            )));
        }

        Ok(Self {
            source: DataSource::new(paths, country_config, MODULE_BASENAME, true, true),
            product,
            area,
            start,
            end,
            cache: RasterCache::new(RASTER_CACHE_CAPACITY),
        })
    }

    pub fn start(&self) -> YearDekad {
        self.start
    }

    pub fn end(&self) -> YearDekad {
        self.end
    }

    pub fn dekads(&self) -> Vec<YearDekad> {
        expand_dekads(self.start, self.end)
    }

    /// Download every dekad in range as a `.tif`, returning the raw directory.
    ///
    /// Dekads the server has no data for are logged and skipped.
    pub fn download(
        &self,
        fetcher: &dyn Fetch,
        clobber: bool,
        progress: &mut dyn DownloadProgress,
    ) -> Result<PathBuf> {
        let dekads = self.dekads();
        let total = dekads.len();
        for (i, yd) in dekads.into_iter().enumerate() {
            let current = i + 1;
            let filepath = self.raw_path(yd);
            if filepath.exists() && !clobber {
                progress.on_skipped(current, total, &filepath, "already exists");
                continue;
            }
            progress.on_start(current, total, &filepath);
            if self.download_dekad(fetcher, yd, &filepath)? {
                progress.on_complete(current, total, &filepath);
            } else {
                progress.on_skipped(current, total, &filepath, "no data available");
            }
        }
        Ok(self.source.raw_base_dir().to_path_buf())
    }

    fn download_dekad(&self, fetcher: &dyn Fetch, yd: YearDekad, filepath: &Path) -> Result<bool> {
        let url = self.url(&self.raw_filename(yd, false));
        let Some(bytes) = fetcher.fetch(&url)? else {
            log::error!(
                "No NDVI data available for dekad {} of {}, skipping.",
                yd.dekad,
                yd.year
            );
            return Ok(false);
        };

        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if !file.name().ends_with(".tif") {
                continue;
            }
            // Rename to the local, four digit year name
            ensure_parent(filepath)?;
            let partial = filepath.with_extension("part");
            {
                let mut out = std::fs::File::create(&partial)?;
                std::io::copy(&mut file, &mut out)?;
                out.flush()?;
            }
            std::fs::rename(&partial, filepath)?;
            self.cache.invalidate(filepath);
            return Ok(true);
        }

        log::warn!("Archive at {} contains no .tif file", url);
        Ok(false)
    }

    /// Load the raster of one dekad
    pub fn load_raster(&self, date: impl Into<DateInput>) -> Result<DekadRaster> {
        let input: DateInput = date.into();
        let yd = input.to_year_dekad()?;
        let filepath = self.raw_path(yd);
        if !filepath.is_file() {
            return Err(AatoolboxError::FileNotFound {
                hint: self.missing_raster_hint(yd, &filepath),
                path: filepath,
            });
        }
        Ok(DekadRaster {
            year_dekad: yd,
            date: yd.to_date()?,
            raster: self.cache.get_or_load(&filepath)?,
        })
    }

    fn missing_raster_hint(&self, yd: YearDekad, filepath: &Path) -> String {
        if yd > self.end || yd < self.start {
            let (relation, bound_name, bound) = if yd > self.end {
                ("greater", "end", self.end)
            } else {
                ("less", "start", self.start)
            };
            format!(
                "The requested year and dekad, {}, are {} than the instance {} year and dekad, {}. \
                 Calling download() will not download this file, create a new instance that includes these dates.",
                yd, relation, bound_name, bound
            )
        } else {
            format!(
                "Make sure that you have called download() and that the file {} exists in {}.",
                filepath.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                filepath.parent().map(|p| p.display().to_string()).unwrap_or_default()
            )
        }
    }

    /// Compute zonal statistics for every dekad and feature and write them to
    /// the processed CSV for `feature_col`.
    ///
    /// With an existing file whose statistics match, `clobber` re-processes
    /// the instance's dekads; otherwise only missing dekads are processed. If
    /// the statistics differ the file is replaced when `clobber` is set and an
    /// error is returned when it is not.
    pub fn process(
        &self,
        features: &[Feature],
        feature_col: &str,
        options: &StatsOptions,
        clobber: bool,
    ) -> Result<PathBuf> {
        options.validate()?;
        let stat_columns = options.column_names();
        let reserved: Vec<&str> = RequiredColumn::all().iter().map(|c| c.as_str()).collect();
        if reserved.contains(&feature_col) || stat_columns.iter().any(|c| c == feature_col) {
            return Err(AatoolboxError::Configuration(format!(
                "feature_col '{}' collides with an output column",
                feature_col
            )));
        }

        let processed_path = self.processed_path(feature_col);
        let all_dates = self.dekads();

        let (dates_to_process, existing) = if processed_path.is_file() {
            let (dates, existing) =
                self.determine_process_dates(&processed_path, feature_col, &stat_columns, all_dates, clobber)?;
            if dates.is_empty() {
                log::info!(
                    "No new data to process between {} and {}, set clobber to re-process this data.",
                    self.start,
                    self.end
                );
                return Ok(processed_path);
            }
            (dates, existing)
        } else {
            (all_dates, None)
        };

        let stats: Vec<(YearDekad, Vec<ZonalStats>)> = dates_to_process
            .par_iter()
            .map(|&yd| {
                let dekad_raster = self.load_raster(yd)?;
                Ok((yd, compute_raster_stats(&dekad_raster.raster, features, options)))
            })
            .collect::<Result<_>>()?;

        let mut df = stats_frame(&stats, &stat_columns, feature_col)?;
        if let Some(existing) = existing {
            let mut combined = existing;
            combined.vstack_mut(&df)?;
            df = combined;
        }
        let mut df = df.sort(
            ["date"],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;

        CsvStore::save(&processed_path, &mut df)?;
        Ok(processed_path)
    }

    fn determine_process_dates(
        &self,
        processed_path: &Path,
        feature_col: &str,
        stat_columns: &[String],
        dates_to_process: Vec<YearDekad>,
        clobber: bool,
    ) -> Result<(Vec<YearDekad>, Option<DataFrame>)> {
        let df = read_processed(processed_path, feature_col)?;

        let mut expected: Vec<String> = stat_columns.to_vec();
        expected.push(feature_col.to_string());
        let existing: Vec<String> = df
            .get_column_names()
            .iter()
            .skip(RequiredColumn::all().len())
            .map(|c| c.to_string())
            .collect();

        if existing != expected {
            if clobber {
                log::warn!(
                    "Original data frame with columns {} being overwritten by data frame with columns {}.",
                    existing.join(", "),
                    expected.join(", ")
                );
                return Ok((dates_to_process, None));
            }
            return Err(AatoolboxError::StatsMismatch {
                feature_col: feature_col.to_string(),
                expected: expected.join(", "),
                found: existing.join(", "),
            });
        }

        let df = normalize_dtypes(df, stat_columns, feature_col)?;
        let processed = year_dekads(&df)?;

        if clobber {
            // Drop the dekads about to be re-processed
            let requested: HashSet<YearDekad> = dates_to_process.iter().copied().collect();
            let mask: BooleanChunked = processed
                .iter()
                .map(|yd| Some(yd.map_or(true, |yd| !requested.contains(&yd))))
                .collect();
            let kept = df.filter(&mask)?;
            Ok((dates_to_process, Some(kept)))
        } else {
            let done: HashSet<YearDekad> = processed.into_iter().flatten().collect();
            let remaining = dates_to_process
                .into_iter()
                .filter(|yd| !done.contains(yd))
                .collect();
            Ok((remaining, Some(df)))
        }
    }

    /// Processed statistics for `feature_col`, restricted to the instance's
    /// dekads. `date` is returned as a Date column.
    pub fn load(&self, feature_col: &str) -> Result<DataFrame> {
        let path = self.processed_path(feature_col);
        let df = read_processed(&path, feature_col).map_err(|err| match err {
            AatoolboxError::FileNotFound { path, .. } => AatoolboxError::FileNotFound {
                path,
                hint: "Make sure that you have already called process() with the same feature column.".to_string(),
            },
            other => other,
        })?;

        let mask: BooleanChunked = year_dekads(&df)?
            .into_iter()
            .map(|yd| Some(yd.is_some_and(|yd| yd >= self.start && yd <= self.end)))
            .collect();
        let df = df.filter(&mask)?;
        CsvStore::cast_columns(df, &["date"], &DataType::Date)
    }

    /// Raw file name without extension. Local names carry the four digit
    /// year and an underscore; names on the server use a two digit year.
    pub fn raw_filename(&self, yd: YearDekad, local: bool) -> String {
        let file_year = if local {
            format!("{:04}_", yd.year)
        } else {
            format!("{:02}", yd.year - 2000)
        };
        format!(
            "{}{}{:02}{}",
            self.area.area_prefix(),
            file_year,
            yd.dekad,
            self.product.data_variable_suffix()
        )
    }

    pub fn raw_path(&self, yd: YearDekad) -> PathBuf {
        self.source
            .raw_base_dir()
            .join(format!("{}.tif", self.raw_filename(yd, true)))
    }

    pub fn processed_path(&self, feature_col: &str) -> PathBuf {
        self.source.processed_base_dir().join(format!(
            "{}_usgs_ndvi_{}_{}.csv",
            self.source.iso3(),
            self.product.data_variable(),
            feature_col
        ))
    }

    pub fn url(&self, filename: &str) -> String {
        format!(
            "{}/{}/dekadal/emodis/ndvi_c6/{}/downloads/dekadal/{}.zip",
            BASE_URL,
            self.area.area_url(),
            self.product.data_variable_url(),
            filename
        )
    }
}

/// Feature identifiers and dates are read as strings, never inferred
fn read_processed(path: &Path, feature_col: &str) -> Result<DataFrame> {
    let required: Vec<&str> = RequiredColumn::all().iter().map(|c| c.as_str()).collect();
    let dtypes = [
        (RequiredColumn::Date.as_str(), DataType::String),
        (feature_col, DataType::String),
    ];
    CsvStore::load_and_validate_with_dtypes(path, &required, &dtypes)
}

fn normalize_dtypes(df: DataFrame, stat_columns: &[String], feature_col: &str) -> Result<DataFrame> {
    let stats: Vec<&str> = stat_columns.iter().map(String::as_str).collect();
    let df = CsvStore::cast_columns(df, &["date", feature_col], &DataType::String)?;
    let df = CsvStore::cast_columns(df, &["year", "dekad"], &DataType::Int64)?;
    CsvStore::cast_columns(df, &stats, &DataType::Float64)
}

fn year_dekads(df: &DataFrame) -> Result<Vec<Option<YearDekad>>> {
    let years = df.column("year")?.cast(&DataType::Int64)?;
    let dekads = df.column("dekad")?.cast(&DataType::Int64)?;
    Ok(years
        .i64()?
        .into_iter()
        .zip(dekads.i64()?.into_iter())
        .map(|(year, dekad)| match (year, dekad) {
            (Some(year), Some(dekad)) => YearDekad::new(year as i32, dekad as u32).ok(),
            _ => None,
        })
        .collect())
}

fn stats_frame(
    stats: &[(YearDekad, Vec<ZonalStats>)],
    stat_columns: &[String],
    feature_col: &str,
) -> Result<DataFrame> {
    let rows: Vec<(YearDekad, &ZonalStats)> = stats
        .iter()
        .flat_map(|(yd, zonal)| zonal.iter().map(move |z| (*yd, z)))
        .collect();

    let dates = rows
        .iter()
        .map(|(yd, _)| yd.to_date().map(|d| d.format("%Y-%m-%d").to_string()))
        .collect::<Result<Vec<_>>>()?;
    let years: Vec<i64> = rows.iter().map(|(yd, _)| i64::from(yd.year)).collect();
    let dekads: Vec<i64> = rows.iter().map(|(yd, _)| i64::from(yd.dekad)).collect();

    let mut columns = vec![
        Column::new(RequiredColumn::Date.as_str().into(), dates),
        Column::new(RequiredColumn::Year.as_str().into(), years),
        Column::new(RequiredColumn::Dekad.as_str().into(), dekads),
    ];
    for (i, name) in stat_columns.iter().enumerate() {
        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|(_, z)| z.values.get(i).copied().flatten())
            .collect();
        columns.push(Column::new(name.as_str().into(), values));
    }
    let features: Vec<String> = rows.iter().map(|(_, z)| z.feature.clone()).collect();
    columns.push(Column::new(feature_col.into(), features));

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UsgsNdviConfig;

    fn ndvi(product: NdviProduct, start: (i32, u32), end: (i32, u32)) -> UsgsNdvi {
        let mut country = CountryConfig::new("bfa").unwrap();
        country.usgs_ndvi = Some(UsgsNdviConfig {
            area_name: UsgsNdviAreaName::WestAfrica,
        });
        UsgsNdvi::new(
            &PathConfig::with_base_dir("/aa"),
            country,
            product,
            Some(&start.into()),
            Some(&end.into()),
        )
        .unwrap()
    }

    #[test]
    fn test_raw_filenames() {
        let ndvi = ndvi(NdviProduct::PercentMedian, (2020, 1), (2020, 3));
        let yd = YearDekad::new(2020, 5).unwrap();
        assert_eq!(ndvi.raw_filename(yd, true), "wa2020_05pmedian");
        assert_eq!(ndvi.raw_filename(yd, false), "wa2005pmedian");
        assert_eq!(
            ndvi.raw_path(yd),
            PathBuf::from("/aa/public/raw/glb/usgs_ndvi/wa2020_05pmedian.tif")
        );
    }

    #[test]
    fn test_url() {
        let ndvi = ndvi(NdviProduct::Smoothed, (2020, 1), (2020, 3));
        assert_eq!(
            ndvi.url("wa2001"),
            "https://edcintl.cr.usgs.gov/downloads/sciweb1/shared/fews/web/africa/west/dekadal/emodis/ndvi_c6/temporallysmoothedndvi/downloads/dekadal/wa2001.zip"
        );
    }

    #[test]
    fn test_processed_path() {
        let ndvi = ndvi(NdviProduct::MedianAnomaly, (2020, 1), (2020, 3));
        assert_eq!(
            ndvi.processed_path("ADM2_FR"),
            PathBuf::from("/aa/public/processed/bfa/usgs_ndvi/bfa_usgs_ndvi_median_anomaly_ADM2_FR.csv")
        );
    }

    #[test]
    fn test_start_clamped_to_earliest() {
        let ndvi = ndvi(NdviProduct::Smoothed, (2001, 1), (2002, 20));
        assert_eq!(ndvi.start(), EARLIEST_DEKAD);
        assert_eq!(ndvi.dekads().len(), 2);
    }

    #[test]
    fn test_requires_area() {
        let result = UsgsNdvi::new(
            &PathConfig::with_base_dir("/aa"),
            CountryConfig::new("bfa").unwrap(),
            NdviProduct::Smoothed,
            None,
            None,
        );
        assert!(matches!(result, Err(AatoolboxError::Configuration(_))));
    }

    #[test]
    fn test_missing_raster_hint() {
        let ndvi = ndvi(NdviProduct::Smoothed, (2020, 1), (2020, 3));
        let err = ndvi.load_raster((2020, 10)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("greater than the instance end"));

        let err = ndvi.load_raster((2020, 2)).unwrap_err();
        assert!(err.to_string().contains("called download()"));
    }
}
