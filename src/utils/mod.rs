pub mod dates;
pub mod geoboundingbox;

pub use dates::{expand_dekads, get_dekadal_date, DateInput, YearDekad};
pub use geoboundingbox::GeoBoundingBox;
