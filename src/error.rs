use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AatoolboxError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Cannot open {path}. {hint}")]
    FileNotFound { path: PathBuf, hint: String },

    #[error("Reporting point {name} has out-of-bounds {axis} value of {value} (GloFAS {axis} ranges from {min} to {max})")]
    OutOfBounds {
        name: String,
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Statistics for {feature_col} do not match existing processed file: expected [{expected}], found [{found}]")]
    StatsMismatch {
        feature_col: String,
        expected: String,
        found: String,
    },

    #[error("CDS API error: {0}")]
    Cds(String),

    #[error("Raster error: {0}")]
    Raster(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

pub type Result<T> = std::result::Result<T, AatoolboxError>;
