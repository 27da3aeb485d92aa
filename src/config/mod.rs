pub mod traits;
pub mod path;
pub mod http;
pub mod cds;
pub mod country;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use path::PathConfig;
pub use http::HttpConfig;
pub use cds::{CdsConfig, CdsCredentials};
pub use country::{create_country_config, CountryConfig, GlofasConfig, ReportingPoint, UsgsNdviAreaName, UsgsNdviConfig};
