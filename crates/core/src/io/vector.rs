//! GeoJSON reading/writing for feature collections
//!
//! The layer CRS travels in the legacy `crs` member
//! (`{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2193"}}`),
//! which is what QGIS and GDAL emit for projected data.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection};
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use std::fs;
use std::path::Path;

/// Read a GeoJSON file. A bare Feature or Geometry becomes a one-feature
/// collection.
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_geojson(&text)
}

/// Parse GeoJSON text into a [`FeatureCollection`]
pub fn parse_geojson(text: &str) -> Result<FeatureCollection> {
    let geojson: GeoJson = text.parse()?;

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = fc.foreign_members.as_ref().and_then(crs_from_members);
            let features = fc
                .features
                .into_iter()
                .map(convert_feature)
                .collect::<Result<Vec<_>>>()?;
            Ok(FeatureCollection { features, crs })
        }
        GeoJson::Feature(f) => Ok(FeatureCollection {
            features: vec![convert_feature(f)?],
            crs: None,
        }),
        GeoJson::Geometry(g) => {
            let geometry = geo_types::Geometry::<f64>::try_from(g)?;
            Ok(FeatureCollection {
                features: vec![Feature::new(geometry)],
                crs: None,
            })
        }
    }
}

fn crs_from_members(members: &JsonObject) -> Option<CRS> {
    members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(CRS::from_authority)
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()?;

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, attribute_from_json(v)))
        .collect();

    let id = feature.id.map(|id| match id {
        Id::String(s) => s,
        Id::Number(n) => n.to_string(),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn attribute_from_json(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
        },
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::String(other.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        // non-finite floats have no JSON form
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

/// Serialize a [`FeatureCollection`] to GeoJSON text
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .features
        .iter()
        .map(|f| {
            let properties: JsonObject = f
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: f
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: f.id.clone().map(Id::String),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = collection.crs.as_ref().and_then(|crs| {
        let name = match crs.epsg() {
            Some(code) => format!("urn:ogc:def:crs:EPSG::{}", code),
            None => crs.wkt()?.to_string(),
        };
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({ "type": "name", "properties": { "name": name } }),
        );
        Some(members)
    });

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    Ok(serde_json::to_string(&fc)?)
}

/// Write a [`FeatureCollection`] to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let text = to_geojson_string(collection)?;
    fs::write(path.as_ref(), text).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, Geometry};

    #[test]
    fn test_parse_collection_with_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::2193"}},
            "features": [{
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]},
                "properties": {"Reach": 3, "isAG": 1.0, "name": "a"}
            }]
        }"#;

        let fc = parse_geojson(text).unwrap();
        assert_eq!(fc.crs.as_ref().and_then(CRS::epsg), Some(2193));
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.features[0].get_i64("Reach"), Some(3));
        assert_eq!(fc.features[0].get_f64("isAG"), Some(1.0));
        assert!(matches!(
            fc.features[0].geometry,
            Some(Geometry::LineString(_))
        ));
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.geojson");

        let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(2193)));
        fc.push(
            Feature::new(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]))
                .with("DB_ID", 4i64)
                .with("Height (m)", 3.0)
                .with("Ratio", f64::NAN),
        );
        write_geojson(&fc, &path).unwrap();

        let back = read_geojson(&path).unwrap();
        assert_eq!(back.crs.as_ref().and_then(CRS::epsg), Some(2193));
        assert_eq!(back.features[0].get_i64("DB_ID"), Some(4));
        assert_eq!(back.features[0].get_f64("Height (m)"), Some(3.0));
        assert!(back.features[0].get_property("Ratio").unwrap().is_null());
    }
}
