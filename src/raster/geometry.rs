use crate::error::{AatoolboxError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// A closed ring of `(x, y)` vertices
pub type Ring = Vec<(f64, f64)>;

/// A polygon: the exterior ring followed by any holes
pub type Polygon = Vec<Ring>;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    fn polygons(&self) -> &[Polygon] {
        match self {
            Self::Polygon(polygon) => std::slice::from_ref(polygon),
            Self::MultiPolygon(polygons) => polygons,
        }
    }

    /// `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.polygons()
            .iter()
            .flatten()
            .flatten()
            .fold(None, |acc, &(x, y)| match acc {
                None => Some((x, y, x, y)),
                Some((min_x, min_y, max_x, max_y)) => {
                    Some((min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y)))
                }
            })
    }

    /// Even-odd containment; points inside a hole are outside
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygons().iter().any(|polygon| {
            polygon
                .iter()
                .filter(|ring| ring_crosses(ring, x, y))
                .count()
                % 2
                == 1
        })
    }
}

fn ring_crosses(ring: &Ring, x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A geometry with its identifying attribute
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    pub geometry: Geometry,
}

#[derive(Deserialize)]
struct RawCollection {
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
    geometry: Option<RawGeometry>,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Value,
}

/// Read a GeoJSON `FeatureCollection`, labelling each feature by `feature_col`
pub fn read_features<P: AsRef<Path>>(path: P, feature_col: &str) -> Result<Vec<Feature>> {
    let contents = std::fs::read_to_string(path)?;
    parse_features(&contents, feature_col)
}

pub fn parse_features(geojson: &str, feature_col: &str) -> Result<Vec<Feature>> {
    let collection: RawCollection = serde_json::from_str(geojson)?;
    collection
        .features
        .into_iter()
        .enumerate()
        .filter_map(|(i, feature)| {
            // Features without geometry carry no pixels
            let geometry = feature.geometry?;
            Some((i, feature.properties, geometry))
        })
        .map(|(i, properties, geometry)| {
            let id = properties
                .as_ref()
                .and_then(|p| p.get(feature_col))
                .and_then(property_to_string)
                .ok_or_else(|| {
                    AatoolboxError::Processing(format!(
                        "Feature {} has no '{}' property",
                        i, feature_col
                    ))
                })?;
            Ok(Feature {
                id,
                geometry: convert_geometry(geometry)?,
            })
        })
        .collect()
}

fn property_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn convert_geometry(raw: RawGeometry) -> Result<Geometry> {
    match raw.kind.as_str() {
        "Polygon" => {
            let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(raw.coordinates)?;
            Ok(Geometry::Polygon(to_polygon(rings)?))
        }
        "MultiPolygon" => {
            let polygons: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(raw.coordinates)?;
            let polygons = polygons.into_iter().map(to_polygon).collect::<Result<_>>()?;
            Ok(Geometry::MultiPolygon(polygons))
        }
        other => Err(AatoolboxError::Processing(format!(
            "Unsupported geometry type {}",
            other
        ))),
    }
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon> {
    rings
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .map(|position| match position.as_slice() {
                    [x, y, ..] => Ok((*x, *y)),
                    _ => Err(AatoolboxError::Processing(
                        "Position needs at least two coordinates".to_string(),
                    )),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_hole() -> Geometry {
        Geometry::Polygon(vec![
            vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)],
            vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0), (1.0, 1.0)],
        ])
    }

    #[test]
    fn test_contains_respects_holes() {
        let geometry = square_with_hole();
        assert!(geometry.contains(3.0, 3.0));
        assert!(!geometry.contains(1.5, 1.5));
        assert!(!geometry.contains(5.0, 1.0));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(square_with_hole().bounds(), Some((0.0, 0.0, 4.0, 4.0)));
    }

    #[test]
    fn test_parse_features() {
        let geojson = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"ADM1": "North", "code": 1},
                    "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}
                },
                {
                    "type": "Feature",
                    "properties": {"ADM1": "South", "code": 2},
                    "geometry": {
                        "type": "MultiPolygon",
                        "bbox": [0, -2, 1, -1],
                        "coordinates": [[[[0, -1, 0], [1, -1, 0], [1, -2, 0], [0, -1, 0]]]]
                    }
                }
            ]
        }"#;

        let features = parse_features(geojson, "ADM1").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "North");
        assert!(matches!(features[1].geometry, Geometry::MultiPolygon(_)));

        let by_code = parse_features(geojson, "code").unwrap();
        assert_eq!(by_code[1].id, "2");

        assert!(parse_features(geojson, "missing").is_err());
    }
}
