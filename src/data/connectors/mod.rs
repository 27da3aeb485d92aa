mod csv;
mod types;
mod validator;

pub use csv::CsvStore;
pub use types::{DatasetMetadata, RequiredColumn};
pub use validator::TableValidator;
