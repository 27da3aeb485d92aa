//! USGS FEWS NET eMODIS NDVI

mod ndvi;
mod product;

pub use ndvi::{DekadRaster, UsgsNdvi, EARLIEST_DEKAD};
pub use product::NdviProduct;
