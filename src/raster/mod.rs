pub mod geometry;
pub mod geotiff;
pub mod stats;

pub use geometry::{parse_features, read_features, Feature, Geometry};
pub use geotiff::{GeoTransform, Raster};
pub use stats::{compute_raster_stats, Stat, StatsOptions, ZonalStats};
