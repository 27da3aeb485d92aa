use serde::{Deserialize, Serialize};

/// Leading columns of every processed dekadal table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredColumn {
    Date,
    Year,
    Dekad,
}

impl RequiredColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Year => "year",
            Self::Dekad => "dekad",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Date, Self::Year, Self::Dekad]
    }
}

/// Summary of a processed table on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub file_path: String,
    pub num_rows: usize,
    pub num_columns: usize,
    pub columns: Vec<String>,
    pub date_column: Option<String>,
    pub date_range: Option<(String, String)>,
}
