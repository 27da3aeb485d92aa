//! GloFAS river discharge from the Copernicus Climate Data Store

mod cds;
mod dataset;
mod decoder;
mod grid;
mod product;

pub use cds::{CdsClient, CdsRetrieve};
pub use dataset::{Glofas, GlofasRequest};
pub use decoder::{GribDecoder, MessageKind};
pub use grid::{DischargeGrid, Members};
pub use product::GlofasProduct;
