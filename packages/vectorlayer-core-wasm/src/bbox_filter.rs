use geo::{BoundingRect, Intersects};
use geo_types::{Coord, Geometry, Rect};
use serde::{Deserialize, Serialize};

use crate::feature::Feature;

/// Axis-aligned bounding box, `[minX, minY, maxX, maxY]` on the wire
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl From<[f64; 4]> for Extent {
    fn from(v: [f64; 4]) -> Self {
        Extent { min_x: v[0], min_y: v[1], max_x: v[2], max_y: v[3] }
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        [e.min_x, e.min_y, e.max_x, e.max_y]
    }
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Extent { min_x, min_y, max_x, max_y }
    }

    pub fn extend(&mut self, other: &Extent) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn of_geometry(geometry: &Geometry<f64>) -> Option<Extent> {
        geometry.bounding_rect().map(|rect| Extent {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        })
    }

    /// Union of the extents of all feature geometries, `None` when nothing has a geometry
    pub fn of_features(features: &[Feature]) -> Option<Extent> {
        features
            .iter()
            .filter_map(|f| f.with_geometry(|g| g.and_then(Extent::of_geometry)))
            .reduce(|mut acc, e| {
                acc.extend(&e);
                acc
            })
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            Coord { x: self.min_x, y: self.min_y },
            Coord { x: self.max_x, y: self.max_y },
        )
    }
}

// Check if a point is inside an extent (borders included)
pub fn point_in_extent(point: Coord<f64>, extent: &Extent) -> bool {
    point.x >= extent.min_x && point.x <= extent.max_x && point.y >= extent.min_y && point.y <= extent.max_y
}

/// Does any part of `geometry` touch `extent` (borders count)
pub fn geometry_intersects_extent(geometry: &Geometry<f64>, extent: &Extent) -> bool {
    geometry.intersects(&extent.to_rect())
}
