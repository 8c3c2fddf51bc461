use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::style::Style;

// Identifier of a feature, as given by the data source (GeoJSON allows both)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Number(i64),
    Text(String),
}

impl FeatureId {
    /// Generate a fresh random identifier for features that arrive without one
    pub fn generate() -> Self {
        FeatureId::Text(uuid::Uuid::new_v4().to_string())
    }

    /// Identifier from a GeoJSON `id` member. Integral numbers stay numeric,
    /// other numbers keep their textual form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(text) => Some(FeatureId::Text(text.clone())),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Some(FeatureId::Number(i)),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(FeatureId::Number(f as i64)),
                _ => Some(FeatureId::Text(n.to_string())),
            },
            _ => None,
        }
    }

    /// An identifier that cannot address anything (blank text)
    pub fn is_empty(&self) -> bool {
        match self {
            FeatureId::Number(_) => false,
            FeatureId::Text(text) => text.trim().is_empty(),
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Number(n) => write!(f, "{}", n),
            FeatureId::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        FeatureId::Text(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        FeatureId::Text(value)
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        FeatureId::Number(value)
    }
}

// Feature geometry types
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(GeometryType::Point),
            Geometry::MultiPoint(_) => Some(GeometryType::MultiPoint),
            Geometry::Line(_) | Geometry::LineString(_) => Some(GeometryType::LineString),
            Geometry::MultiLineString(_) => Some(GeometryType::MultiLineString),
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                Some(GeometryType::Polygon)
            }
            Geometry::MultiPolygon(_) => Some(GeometryType::MultiPolygon),
            Geometry::GeometryCollection(_) => Some(GeometryType::GeometryCollection),
        }
    }

    /// GeoJSON spelling of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Point" => Some(GeometryType::Point),
            "LineString" => Some(GeometryType::LineString),
            "Polygon" => Some(GeometryType::Polygon),
            "MultiPoint" => Some(GeometryType::MultiPoint),
            "MultiLineString" => Some(GeometryType::MultiLineString),
            "MultiPolygon" => Some(GeometryType::MultiPolygon),
            "GeometryCollection" => Some(GeometryType::GeometryCollection),
            _ => None,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, GeometryType::Point | GeometryType::MultiPoint)
    }

    pub fn is_line(&self) -> bool {
        matches!(self, GeometryType::LineString | GeometryType::MultiLineString)
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, GeometryType::Polygon | GeometryType::MultiPolygon)
    }
}

#[derive(Debug)]
struct FeatureInner {
    id: FeatureId,
    geometry: RefCell<Option<Geometry<f64>>>,
    properties: RefCell<serde_json::Map<String, serde_json::Value>>,
    style: RefCell<Option<Style>>,
}

/// A map feature.
///
/// Cloning yields another handle to the same feature: the backend, the
/// layer and the caller all see style and property changes made through any
/// of them. Two features are equal when their ids are.
#[derive(Clone, Debug)]
pub struct Feature(Rc<FeatureInner>);

impl Feature {
    pub fn new(id: impl Into<FeatureId>, geometry: Option<Geometry<f64>>) -> Self {
        Feature(Rc::new(FeatureInner {
            id: id.into(),
            geometry: RefCell::new(geometry),
            properties: RefCell::new(serde_json::Map::new()),
            style: RefCell::new(None),
        }))
    }

    pub fn with_properties(self, properties: serde_json::Map<String, serde_json::Value>) -> Self {
        *self.0.properties.borrow_mut() = properties;
        self
    }

    pub fn id(&self) -> &FeatureId {
        &self.0.id
    }

    pub fn geometry(&self) -> Option<Geometry<f64>> {
        self.0.geometry.borrow().clone()
    }

    pub fn set_geometry(&self, geometry: Option<Geometry<f64>>) {
        *self.0.geometry.borrow_mut() = geometry;
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.0.geometry.borrow().as_ref().and_then(GeometryType::of)
    }

    /// Run `f` against the geometry without cloning it
    pub fn with_geometry<R>(&self, f: impl FnOnce(Option<&Geometry<f64>>) -> R) -> R {
        f(self.0.geometry.borrow().as_ref())
    }

    pub fn property(&self, key: &str) -> Option<serde_json::Value> {
        self.0.properties.borrow().get(key).cloned()
    }

    pub fn set_property(&self, key: &str, value: serde_json::Value) {
        self.0.properties.borrow_mut().insert(key.to_string(), value);
    }

    pub fn properties(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0.properties.borrow().clone()
    }

    /// Per-feature style override, if any
    pub fn style(&self) -> Option<Style> {
        self.0.style.borrow().clone()
    }

    pub fn set_style(&self, style: Option<Style>) {
        *self.0.style.borrow_mut() = style;
    }

    pub fn clear_style(&self) {
        self.set_style(None);
    }

    /// True when both handles point at the same feature instance
    pub fn ptr_eq(&self, other: &Feature) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Feature {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
