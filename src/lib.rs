//! Downloading and processing of humanitarian anticipatory action datasets

pub mod config;
pub mod data;
pub mod datasources;
pub mod error;
pub mod http;
pub mod raster;
pub mod utils;

pub use error::{AatoolboxError, Result};
