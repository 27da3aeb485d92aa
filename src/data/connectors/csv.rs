use crate::error::{AatoolboxError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use super::{
    types::DatasetMetadata,
    validator::TableValidator,
};

pub struct CsvStore;

impl CsvStore {
    /// Load CSV file into DataFrame
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
        Self::load_with_dtypes(path, &[])
    }

    /// Load CSV file, reading the named columns as the given types instead of
    /// inferring them. Identifiers such as "01" stay strings this way.
    pub fn load_with_dtypes<P: AsRef<Path>>(path: P, dtypes: &[(&str, DataType)]) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(AatoolboxError::FileNotFound {
                path: path.to_path_buf(),
                hint: "Make sure that the file has been processed.".to_string(),
            });
        }
        let overwrite = (!dtypes.is_empty()).then(|| {
            let fields = dtypes
                .iter()
                .map(|(name, dtype)| Field::new((*name).into(), dtype.clone()));
            Arc::new(Schema::from_iter(fields))
        });
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_schema_overwrite(overwrite)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .map_err(|e| AatoolboxError::Processing(format!("Failed to read CSV: {}", e)))?;

        let null_report = TableValidator::check_nulls(&df);
        if !null_report.is_empty() {
            log::warn!("Null values detected in {}: {:?}", path.display(), null_report);
        }

        Ok(df)
    }

    /// Load CSV and check that `required` columns are present
    pub fn load_and_validate<P: AsRef<Path>>(path: P, required: &[&str]) -> Result<DataFrame> {
        Self::load_and_validate_with_dtypes(path, required, &[])
    }

    /// [`Self::load_and_validate`] with explicit column types
    pub fn load_and_validate_with_dtypes<P: AsRef<Path>>(
        path: P,
        required: &[&str],
        dtypes: &[(&str, DataType)],
    ) -> Result<DataFrame> {
        let df = Self::load_with_dtypes(&path, dtypes)?;
        TableValidator::validate_columns(&df, required)?;
        Ok(df)
    }

    /// Write `df`, replacing any existing file
    pub fn save<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        log::info!("Writing to {}", path.display());
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }

    /// Cast the named columns to `dtype`
    pub fn cast_columns(mut df: DataFrame, columns: &[&str], dtype: &DataType) -> Result<DataFrame> {
        for name in columns {
            let cast = df.column(name)?.cast(dtype)?;
            df.with_column(cast)?;
        }
        Ok(df)
    }

    /// Create metadata for a loaded DataFrame
    pub fn create_metadata<P: AsRef<Path>>(path: P, df: &DataFrame) -> Result<DatasetMetadata> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

        let date_column = Self::detect_date_column(df);
        let date_range = match &date_column {
            Some(name) if df.height() > 0 => {
                let dates = df.column(name)?.cast(&DataType::String)?;
                let dates = dates.str()?;
                let first = dates.into_iter().flatten().min().map(str::to_string);
                let last = dates.into_iter().flatten().max().map(str::to_string);
                first.zip(last)
            }
            _ => None,
        };

        Ok(DatasetMetadata {
            file_path: path.as_ref().to_string_lossy().to_string(),
            num_rows: df.height(),
            num_columns: df.width(),
            columns,
            date_column,
            date_range,
        })
    }

    fn detect_date_column(df: &DataFrame) -> Option<String> {
        let aliases = ["date", "time", "datetime"];
        let columns = df.get_column_names();
        aliases
            .iter()
            .find(|&&alias| columns.iter().any(|col| col.as_str() == alias))
            .map(|alias| alias.to_string())
    }
}
