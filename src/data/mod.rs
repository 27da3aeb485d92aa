pub mod cache;
pub mod connectors;

pub use cache::RasterCache;
pub use connectors::{CsvStore, DatasetMetadata, RequiredColumn, TableValidator};
