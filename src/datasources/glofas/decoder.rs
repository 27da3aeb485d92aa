use super::grid::DischargeGrid;
use crate::error::Result;
use std::path::Path;

/// Which GRIB messages to read, by their `dataType` key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    All,
    /// Control forecast (`cf`)
    Control,
    /// Perturbed ensemble members (`pf`)
    Perturbed,
}

impl MessageKind {
    pub fn data_type(&self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Control => Some("cf"),
            Self::Perturbed => Some("pf"),
        }
    }
}

/// Reads one raw GloFAS GRIB file into a grid.
///
/// The control forecast is expected as a grid with a scalar member.
pub trait GribDecoder {
    fn decode(&self, path: &Path, kind: MessageKind) -> Result<DischargeGrid>;
}
