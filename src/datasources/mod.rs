pub mod datasource;
pub mod glofas;
pub mod usgs;

pub use datasource::{check_file_existence, DataSource};
pub use glofas::{Glofas, GlofasProduct, GlofasRequest};
pub use usgs::{NdviProduct, UsgsNdvi};
