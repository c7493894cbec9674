//! Serde helpers that encode `kurbo::Point` as a `[x, y]` array.

use kurbo::Point;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `#[serde(with = "wire_point")]` for a single point.
pub fn serialize<S: Serializer>(point: &Point, serializer: S) -> Result<S::Ok, S::Error> {
    [point.x, point.y].serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Point, D::Error> {
    let [x, y] = <[f64; 2]>::deserialize(deserializer)?;
    Ok(Point::new(x, y))
}

/// `#[serde(with = "wire_point::vec")]` for a list of points.
pub mod vec {
    use super::*;

    pub fn serialize<S: Serializer>(points: &[Point], serializer: S) -> Result<S::Ok, S::Error> {
        let raw: Vec<[f64; 2]> = points.iter().map(|p| [p.x, p.y]).collect();
        raw.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Point>, D::Error> {
        let raw = Vec::<[f64; 2]>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|[x, y]| Point::new(x, y)).collect())
    }
}

/// True when both coordinates are finite numbers.
pub fn is_finite(point: Point) -> bool {
    point.x.is_finite() && point.y.is_finite()
}
