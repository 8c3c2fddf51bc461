// GeoJSON <-> Feature conversion for the JavaScript boundary
use geo_types::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{json, Value};

use crate::error::{LayerError, Result};
use crate::feature::{Feature, FeatureId};

/// Parse a GeoJSON `Feature`, `FeatureCollection` or array of features.
/// Features without an `id` get a generated one.
pub fn features_from_geojson(value: &Value) -> Result<Vec<Feature>> {
    match value {
        Value::Array(items) => items.iter().map(feature_from_geojson).collect(),
        Value::Object(obj) => match obj.get("type").and_then(|t| t.as_str()) {
            Some("FeatureCollection") => obj
                .get("features")
                .and_then(|f| f.as_array())
                .ok_or_else(|| LayerError::InvalidGeoJson("FeatureCollection without 'features'".to_string()))?
                .iter()
                .map(feature_from_geojson)
                .collect(),
            Some("Feature") => Ok(vec![feature_from_geojson(value)?]),
            other => Err(LayerError::InvalidGeoJson(format!("unsupported type {:?}", other))),
        },
        _ => Err(LayerError::InvalidGeoJson("expected an object or an array".to_string())),
    }
}

pub fn feature_from_geojson(value: &Value) -> Result<Feature> {
    if value.get("type").and_then(|t| t.as_str()) != Some("Feature") {
        return Err(LayerError::InvalidGeoJson("expected a Feature".to_string()));
    }

    let id = match value.get("id") {
        None | Some(Value::Null) => FeatureId::generate(),
        Some(id) => FeatureId::from_json(id)
            .ok_or_else(|| LayerError::InvalidGeoJson(format!("unsupported feature id {}", id)))?,
    };

    let geometry = match value.get("geometry") {
        None | Some(Value::Null) => None,
        Some(g) => Some(geometry_from_geojson(g)?),
    };

    let properties = match value.get("properties") {
        Some(Value::Object(props)) => props.clone(),
        _ => serde_json::Map::new(),
    };

    Ok(Feature::new(id, geometry).with_properties(properties))
}

pub fn geometry_from_geojson(value: &Value) -> Result<Geometry<f64>> {
    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| LayerError::InvalidGeoJson("geometry without 'type'".to_string()))?;

    if kind == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(|g| g.as_array())
            .ok_or_else(|| LayerError::InvalidGeoJson("GeometryCollection without 'geometries'".to_string()))?
            .iter()
            .map(geometry_from_geojson)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(members)));
    }

    let coords = value
        .get("coordinates")
        .ok_or_else(|| LayerError::InvalidGeoJson(format!("{} without 'coordinates'", kind)))?;

    let geometry = match kind {
        "Point" => Geometry::Point(Point(coord(coords)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint(
            array(coords)?.iter().map(|c| coord(c).map(Point)).collect::<Result<_>>()?,
        )),
        "LineString" => Geometry::LineString(line_string(coords)?),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString(
            array(coords)?.iter().map(line_string).collect::<Result<_>>()?,
        )),
        "Polygon" => Geometry::Polygon(polygon(coords)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon(
            array(coords)?.iter().map(polygon).collect::<Result<_>>()?,
        )),
        other => return Err(LayerError::InvalidGeoJson(format!("unsupported geometry type {}", other))),
    };
    Ok(geometry)
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| LayerError::InvalidGeoJson(format!("expected an array, got {}", value)))
}

fn coord(value: &Value) -> Result<Coord<f64>> {
    let pair = array(value)?;
    match (pair.first().and_then(|v| v.as_f64()), pair.get(1).and_then(|v| v.as_f64())) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(LayerError::InvalidGeoJson(format!("invalid position {}", value))),
    }
}

fn line_string(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString(array(value)?.iter().map(coord).collect::<Result<_>>()?))
}

fn polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?.iter().map(line_string).collect::<Result<Vec<_>>>()?;
    if rings.is_empty() {
        return Err(LayerError::InvalidGeoJson("polygon without rings".to_string()));
    }
    let exterior = rings.remove(0);
    Ok(Polygon::new(exterior, rings))
}

pub fn feature_to_geojson(feature: &Feature) -> Value {
    let geometry = feature.with_geometry(|g| g.map(geometry_to_geojson).unwrap_or(Value::Null));
    json!({
        "type": "Feature",
        "id": feature.id(),
        "geometry": geometry,
        "properties": feature.properties(),
    })
}

pub fn features_to_geojson(features: &[Feature]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features.iter().map(feature_to_geojson).collect::<Vec<_>>(),
    })
}

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn ring(ls: &LineString<f64>) -> Value {
    Value::Array(ls.0.iter().map(position).collect())
}

fn rings(p: &Polygon<f64>) -> Value {
    let mut all = vec![ring(p.exterior())];
    all.extend(p.interiors().iter().map(ring));
    Value::Array(all)
}

pub fn geometry_to_geojson(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position(&p.0)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.iter().map(|p| position(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(line) => json!({
            "type": "LineString",
            "coordinates": [position(&line.start), position(&line.end)],
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": ring(ls)}),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.iter().map(ring).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": rings(p)}),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.iter().map(rings).collect::<Vec<_>>(),
        }),
        Geometry::Rect(r) => json!({"type": "Polygon", "coordinates": rings(&r.to_polygon())}),
        Geometry::Triangle(t) => json!({"type": "Polygon", "coordinates": rings(&t.to_polygon())}),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.iter().map(geometry_to_geojson).collect::<Vec<_>>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::GeometryType;

    #[test]
    fn parses_collection_with_mixed_ids() {
        let features = features_from_geojson(&json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 3, "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {"a": 1}},
                {"type": "Feature", "id": "x", "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
                {"type": "Feature", "geometry": null}
            ]
        }))
        .unwrap();

        assert_eq!(features.len(), 3);
        assert_eq!(features[0].id(), &FeatureId::Number(3));
        assert_eq!(features[0].property("a"), Some(json!(1)));
        assert_eq!(features[1].geometry_type(), Some(GeometryType::Polygon));
        assert!(features[2].geometry().is_none());
        assert!(!features[2].id().is_empty());
    }

    #[test]
    fn fractional_and_float_ids_are_kept() {
        let features = features_from_geojson(&json!([
            {"type": "Feature", "id": 1.5, "geometry": null},
            {"type": "Feature", "id": 2.0, "geometry": null}
        ]))
        .unwrap();
        assert_eq!(features[0].id(), &FeatureId::Text("1.5".to_string()));
        assert_eq!(features[1].id(), &FeatureId::Number(2));

        let err = feature_from_geojson(&json!({"type": "Feature", "id": [1], "geometry": null}));
        assert!(matches!(err, Err(LayerError::InvalidGeoJson(_))));
    }

    #[test]
    fn rejects_broken_positions() {
        let err = features_from_geojson(&json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[0, 0], ["a", 1]]}
        }));
        assert!(matches!(err, Err(LayerError::InvalidGeoJson(_))));
    }

    #[test]
    fn writes_back_the_same_shape() {
        let input = json!({
            "type": "Feature",
            "id": "m",
            "geometry": {"type": "MultiPoint", "coordinates": [[1.0, 2.0], [3.0, 4.0]]},
            "properties": {"name": "pair"}
        });
        let feature = feature_from_geojson(&input).unwrap();
        assert_eq!(feature_to_geojson(&feature), input);
    }
}
