use crate::error::{AatoolboxError, Result};
use serde::{Deserialize, Serialize};

// Precision used to strip floating point noise before and after rounding
const NOISE_SCALE: f64 = 1e9;

/// Geographic bounding box in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoBoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        let bbox = Self { north, south, east, west };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, lat) in [("north", self.north), ("south", self.south)] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AatoolboxError::InvalidBoundingBox(format!(
                    "{} latitude {} outside [-90, 90]",
                    name, lat
                )));
            }
        }
        for (name, lon) in [("east", self.east), ("west", self.west)] {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(AatoolboxError::InvalidBoundingBox(format!(
                    "{} longitude {} outside [-180, 180]",
                    name, lon
                )));
            }
        }
        if self.north < self.south {
            return Err(AatoolboxError::InvalidBoundingBox(format!(
                "north ({}) is less than south ({})",
                self.north, self.south
            )));
        }
        if self.east < self.west {
            return Err(AatoolboxError::InvalidBoundingBox(format!(
                "east ({}) is less than west ({})",
                self.east, self.west
            )));
        }
        Ok(())
    }

    /// Expand the box outwards onto a grid: north and east are rounded up to a
    /// multiple of `round_val` and shifted by `+offset_val`, south and west
    /// rounded down and shifted by `-offset_val`.
    pub fn round_coords(&mut self, offset_val: f64, round_val: f64) {
        self.north = round_up(self.north, round_val) + offset_val;
        self.east = round_up(self.east, round_val) + offset_val;
        self.south = round_down(self.south, round_val) - offset_val;
        self.west = round_down(self.west, round_val) - offset_val;
        for coord in [&mut self.north, &mut self.south, &mut self.east, &mut self.west] {
            *coord = strip_noise(*coord);
        }
    }

    /// Compact representation used in file names, e.g. `Np1d1Sm2d2Ep3d4Wm4d5`
    pub fn get_filename_repr(&self, p: usize) -> String {
        format!(
            "N{}S{}E{}W{}",
            coord_repr(self.north, p),
            coord_repr(self.south, p),
            coord_repr(self.east, p),
            coord_repr(self.west, p),
        )
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lon)
    }
}

fn strip_noise(value: f64) -> f64 {
    (value * NOISE_SCALE).round() / NOISE_SCALE
}

fn round_up(value: f64, round_val: f64) -> f64 {
    strip_noise(value / round_val).ceil() * round_val
}

fn round_down(value: f64, round_val: f64) -> f64 {
    strip_noise(value / round_val).floor() * round_val
}

fn coord_repr(value: f64, p: usize) -> String {
    let formatted = format!("{:.*}", p, value.abs()).replace('.', "d");
    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != 'd') {
        'm'
    } else {
        'p'
    };
    format!("{}{}", sign, formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_round_coords() {
        let mut bbox = GeoBoundingBox::new(1.0, -2.2, 3.3, -4.4).unwrap();
        bbox.round_coords(0.05, 0.1);
        assert!(approx(bbox.north, 1.05));
        assert!(approx(bbox.south, -2.25));
        assert!(approx(bbox.east, 3.35));
        assert!(approx(bbox.west, -4.45));
    }

    #[test]
    fn test_round_coords_integers() {
        let mut bbox = GeoBoundingBox::new(1.0, -2.0, 3.0, -4.0).unwrap();
        bbox.round_coords(0.05, 0.1);
        assert!(approx(bbox.north, 1.05));
        assert!(approx(bbox.south, -2.05));
        assert!(approx(bbox.east, 3.05));
        assert!(approx(bbox.west, -4.05));
    }

    #[test]
    fn test_filename_repr() {
        let mut bbox = GeoBoundingBox::new(1.0, -2.2, 3.3, -4.4).unwrap();
        bbox.round_coords(0.05, 0.1);
        assert_eq!(bbox.get_filename_repr(1), "Np1d1Sm2d2Ep3d4Wm4d5");

        let bbox = GeoBoundingBox::new(15.0, 9.0, 2.4, -5.6).unwrap();
        assert_eq!(bbox.get_filename_repr(0), "Np15Sp9Ep2Wm6");
    }

    #[test]
    fn test_invalid_box() {
        assert!(GeoBoundingBox::new(-1.0, 1.0, 3.0, -4.0).is_err());
        assert!(GeoBoundingBox::new(1.0, -1.0, -3.0, 4.0).is_err());
        assert!(GeoBoundingBox::new(91.0, -1.0, 3.0, -4.0).is_err());
    }
}
