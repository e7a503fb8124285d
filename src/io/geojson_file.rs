use geo::LineString;
use geojson::{GeoJson, JsonObject, Value};
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{Feature, FeatureCollection, Multipatch, PolygonCollection, Ring, Vertex};
use crate::error::{ConvertError, Result};
use crate::geometry::Crs;

/// Read a GeoJSON file of 3D (Multi)Polygon features
pub fn read_geojson(path: &Path) -> Result<FeatureCollection<Multipatch>> {
    let contents = fs::read_to_string(path)?;
    parse_geojson(&contents)
}

/// Parse GeoJSON text into multipatch features.
///
/// The legacy `crs` member names the CRS; without it the collection is WGS84
/// as RFC 7946 prescribes.
pub fn parse_geojson(contents: &str) -> Result<FeatureCollection<Multipatch>> {
    let geojson: GeoJson = contents.parse()?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(feature) => geojson::FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(ConvertError::InvalidGeometry {
                feature: 0,
                reason: "expected a Feature or FeatureCollection, found a bare geometry"
                    .to_string(),
            });
        }
    };

    let crs = collection
        .foreign_members
        .as_ref()
        .and_then(crs_member)
        .unwrap_or_else(Crs::wgs84);

    let features = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let geometry = match feature.geometry {
                Some(geometry) => multipatch_from_value(&geometry.value, index)?,
                None => Multipatch::empty(),
            };
            Ok(Feature::new(feature.properties.unwrap_or_default(), geometry))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureCollection::new(features, Some(crs)))
}

fn crs_member(members: &JsonObject) -> Option<Crs> {
    let name = members.get("crs")?.get("properties")?.get("name")?.as_str()?;
    name.parse().ok()
}

fn multipatch_from_value(value: &Value, feature: usize) -> Result<Multipatch> {
    let polygons = match value {
        Value::MultiPolygon(polygons) => polygons.as_slice(),
        Value::Polygon(polygon) => std::slice::from_ref(polygon),
        _ => {
            return Err(ConvertError::InvalidGeometry {
                feature,
                reason: "expected a Polygon or MultiPolygon".to_string(),
            });
        }
    };

    let parts = polygons
        .iter()
        .map(|rings| {
            rings
                .iter()
                .map(|ring| ring_from_positions(ring, feature))
                .collect::<Result<Vec<Ring>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Multipatch::Parts(parts))
}

fn ring_from_positions(positions: &[Vec<f64>], feature: usize) -> Result<Ring> {
    positions
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, z, ..] => Ok(Vertex::new(*x, *y, *z)),
            _ => Err(ConvertError::InvalidGeometry {
                feature,
                reason: "vertex has no z coordinate".to_string(),
            }),
        })
        .collect()
}

fn line_positions(line: &LineString<f64>) -> Vec<Vec<f64>> {
    line.coords().map(|c| vec![c.x, c.y]).collect()
}

/// Build a GeoJSON FeatureCollection of the converted polygons
pub fn to_geojson(collection: &PolygonCollection) -> geojson::FeatureCollection {
    let features = collection
        .iter()
        .map(|feature| {
            let mut rings = vec![line_positions(feature.geometry.exterior())];
            rings.extend(feature.geometry.interiors().iter().map(line_positions));

            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(Value::Polygon(rings))),
                id: None,
                properties: Some(feature.properties.clone()),
                foreign_members: None,
            }
        })
        .collect();

    let foreign_members = collection.crs.as_ref().map(|crs| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            json!({ "type": "name", "properties": { "name": crs.to_urn() } }),
        );
        members
    });

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Write the collection to a single GeoJSON file
pub fn write_geojson(collection: &PolygonCollection, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, &to_geojson(collection))?;
    writer.flush()?;

    Ok(())
}
