use serde_json::Value;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, PointZ, PolygonRing, Shape};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::domain::{
    Feature, FeatureCollection, Multipatch, Patch, PolygonCollection, Properties, Ring, Vertex,
};
use crate::error::{ConvertError, Result};
use crate::geometry::Crs;
use crate::geometry::crs::WGS84_PRJ;

/// dBase limits field names to 10 bytes
const MAX_FIELD_NAME: usize = 10;
const CHARACTER_FIELD_LENGTH: u8 = 254;
const NUMERIC_FIELD_LENGTH: u8 = 18;
const NUMERIC_DECIMALS: u8 = 6;

/// Read an ESRI shapefile of multipatch (or PolygonZ) records.
///
/// The CRS comes from the sibling `.prj`, when there is one.
pub fn read_shapefile(path: &Path) -> Result<FeatureCollection<Multipatch>> {
    let crs = read_prj(path)?;
    let mut reader = shapefile::Reader::from_path(path)?;

    let mut features = Vec::new();
    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        let geometry = match shape {
            Shape::Multipatch(multipatch) => {
                Multipatch::Patches(multipatch.patches().iter().map(convert_patch).collect())
            }
            Shape::PolygonZ(polygon) => Multipatch::Parts(vec![
                polygon
                    .rings()
                    .iter()
                    .map(|ring| convert_points(ring.points()))
                    .collect(),
            ]),
            Shape::NullShape => Multipatch::empty(),
            other => {
                return Err(ConvertError::InvalidGeometry {
                    feature: index,
                    reason: format!("expected a multipatch, found {:?}", other.shapetype()),
                });
            }
        };

        features.push(Feature::new(record_properties(record), geometry));
    }

    Ok(FeatureCollection::new(features, crs))
}

fn read_prj(path: &Path) -> Result<Option<Crs>> {
    let prj = path.with_extension("prj");
    if !prj.exists() {
        return Ok(None);
    }
    let wkt = fs::read_to_string(prj)?;
    Ok(Some(Crs::from_wkt(&wkt)))
}

fn convert_points(points: &[PointZ]) -> Ring {
    points.iter().map(|p| Vertex::new(p.x, p.y, p.z)).collect()
}

fn convert_patch(patch: &shapefile::Patch) -> Patch {
    match patch {
        shapefile::Patch::TriangleStrip(points) => Patch::TriangleStrip(convert_points(points)),
        shapefile::Patch::TriangleFan(points) => Patch::TriangleFan(convert_points(points)),
        shapefile::Patch::OuterRing(points) => Patch::OuterRing(convert_points(points)),
        shapefile::Patch::InnerRing(points) => Patch::InnerRing(convert_points(points)),
        shapefile::Patch::FirstRing(points) => Patch::FirstRing(convert_points(points)),
        shapefile::Patch::Ring(points) => Patch::Ring(convert_points(points)),
    }
}

fn record_properties(record: Record) -> Properties {
    let fields: HashMap<String, FieldValue> = record.into();
    fields
        .into_iter()
        .map(|(name, value)| (name, field_to_json(value)))
        .collect()
}

fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(s) => s.map(Value::String).unwrap_or(Value::Null),
        FieldValue::Numeric(n) => n.map(Value::from).unwrap_or(Value::Null),
        FieldValue::Logical(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        FieldValue::Float(f) => f.map(|f| Value::from(f64::from(f))).unwrap_or(Value::Null),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Double(d) => Value::from(d),
        other => Value::String(format!("{:?}", other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Numeric,
    Logical,
    Character,
}

/// One dBase column derived from a property key
#[derive(Debug, Clone)]
struct Column {
    key: String,
    name: String,
    kind: FieldKind,
}

/// Infer dBase columns from the union of property keys.
///
/// A key whose non-null values are all numbers becomes numeric, all booleans
/// logical, anything else character. Names are cut to 10 bytes and made unique.
fn infer_columns(collection: &PolygonCollection) -> Vec<Column> {
    let mut kinds: BTreeMap<&str, Option<FieldKind>> = BTreeMap::new();

    for feature in collection.iter() {
        for (key, value) in &feature.properties {
            let observed = match value {
                Value::Null => None,
                Value::Number(_) => Some(FieldKind::Numeric),
                Value::Bool(_) => Some(FieldKind::Logical),
                _ => Some(FieldKind::Character),
            };
            let entry = kinds.entry(key.as_str()).or_insert(None);
            *entry = match (*entry, observed) {
                (None, kind) => kind,
                (Some(kind), None) => Some(kind),
                (Some(a), Some(b)) if a == b => Some(a),
                _ => Some(FieldKind::Character),
            };
        }
    }

    let mut used = HashSet::new();
    kinds
        .into_iter()
        .map(|(key, kind)| {
            let name = unique_field_name(key, &mut used);
            Column {
                key: key.to_string(),
                name,
                kind: kind.unwrap_or(FieldKind::Character),
            }
        })
        .collect()
}

fn unique_field_name(key: &str, used: &mut HashSet<String>) -> String {
    let base = truncate(key, MAX_FIELD_NAME);
    let mut name = base.clone();
    let mut suffix = 1;
    while used.contains(&name) {
        let tag = suffix.to_string();
        name = format!("{}{}", truncate(&base, MAX_FIELD_NAME - tag.len()), tag);
        suffix += 1;
    }
    used.insert(name.clone());
    name
}

fn truncate(s: &str, max_bytes: usize) -> String {
    let mut end = s.len().min(max_bytes);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Character values longer than the column are cut to fit, on a char boundary
fn field_value(value: Option<&Value>, kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Numeric => FieldValue::Numeric(value.and_then(Value::as_f64)),
        FieldKind::Logical => FieldValue::Logical(value.and_then(Value::as_bool)),
        FieldKind::Character => FieldValue::Character(match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(truncate(s, CHARACTER_FIELD_LENGTH as usize)),
            Some(other) => Some(truncate(&other.to_string(), CHARACTER_FIELD_LENGTH as usize)),
        }),
    }
}

fn shp_polygon(polygon: &geo::Polygon<f64>) -> shapefile::Polygon {
    let points = |line: &geo::LineString<f64>| -> Vec<Point> {
        line.coords().map(|c| Point::new(c.x, c.y)).collect()
    };

    let mut rings = vec![PolygonRing::Outer(points(polygon.exterior()))];
    rings.extend(
        polygon
            .interiors()
            .iter()
            .map(|ring| PolygonRing::Inner(points(ring))),
    );
    shapefile::Polygon::with_rings(rings)
}

/// Write the collection as a polygon shapefile.
///
/// Produces `.shp`, `.shx` and `.dbf`, plus a `.cpg` declaring UTF-8 and a
/// `.prj` when the collection is in WGS84.
pub fn write_shapefile(collection: &PolygonCollection, path: &Path) -> Result<()> {
    let columns = infer_columns(collection);

    let mut table = TableWriterBuilder::new();
    for column in &columns {
        let name = FieldName::try_from(column.name.as_str())
            .map_err(|_| ConvertError::InvalidField(column.key.clone()))?;
        table = match column.kind {
            FieldKind::Numeric => table.add_numeric_field(name, NUMERIC_FIELD_LENGTH, NUMERIC_DECIMALS),
            FieldKind::Logical => table.add_logical_field(name),
            FieldKind::Character => table.add_character_field(name, CHARACTER_FIELD_LENGTH),
        };
    }

    let mut writer = shapefile::Writer::from_path(path, table)?;
    for feature in collection.iter() {
        let mut record = Record::default();
        for column in &columns {
            record.insert(
                column.name.clone(),
                field_value(feature.properties.get(&column.key), column.kind),
            );
        }
        writer.write_shape_and_record(&shp_polygon(&feature.geometry), &record)?;
    }
    drop(writer);

    fs::write(path.with_extension("cpg"), "UTF-8")?;
    if collection.crs.as_ref().is_some_and(Crs::is_wgs84) {
        fs::write(path.with_extension("prj"), WGS84_PRJ)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RingSource;
    use geo::polygon;
    use serde_json::json;
    use tempfile::tempdir;

    fn building(name: &str, height: f64) -> Feature<geo::Polygon<f64>> {
        let mut properties = Properties::new();
        properties.insert("name".to_string(), json!(name));
        properties.insert("height".to_string(), json!(height));
        properties.insert("construction_year".to_string(), json!(1999));
        Feature::new(
            properties,
            polygon![(x: 15.0, y: 0.0), (x: 15.0, y: 0.1), (x: 15.1, y: 0.1), (x: 15.1, y: 0.0)],
        )
    }

    #[test]
    fn test_write_shapefile_with_sidecars() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("buildings.shp");
        let collection = PolygonCollection::new(
            vec![building("tower", 10.0), building("annex", 20.0)],
            Some(Crs::wgs84()),
        );

        write_shapefile(&collection, &path).unwrap();

        for ext in ["shp", "shx", "dbf", "prj", "cpg"] {
            assert!(path.with_extension(ext).exists(), "missing .{}", ext);
        }
        assert_eq!(
            Crs::from_wkt(&fs::read_to_string(path.with_extension("prj")).unwrap()),
            Crs::wgs84()
        );

        let mut reader = shapefile::Reader::from_path(&path).unwrap();
        let rows: Vec<(Shape, Record)> = reader
            .iter_shapes_and_records()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);

        let (shape, record) = &rows[1];
        assert!(matches!(shape, Shape::Polygon(_)));
        assert_eq!(
            record.get("height"),
            Some(&FieldValue::Numeric(Some(20.0)))
        );
        assert_eq!(
            record.get("name"),
            Some(&FieldValue::Character(Some("annex".to_string())))
        );
        // truncated to the dBase limit
        assert!(record.get("constructi").is_some());
    }

    #[test]
    fn test_long_character_values_are_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.shp");

        let mut tower = building("tower", 10.0);
        tower.properties.insert("desc".to_string(), json!("x".repeat(300)));
        // two bytes per char, so the cut must land on a char boundary
        tower.properties.insert("note".to_string(), json!("é".repeat(200)));
        let collection = PolygonCollection::new(vec![tower], Some(Crs::wgs84()));

        write_shapefile(&collection, &path).unwrap();

        let mut reader = shapefile::Reader::from_path(&path).unwrap();
        let (_, record) = reader.iter_shapes_and_records().next().unwrap().unwrap();
        assert_eq!(
            record.get("desc"),
            Some(&FieldValue::Character(Some("x".repeat(254))))
        );
        assert_eq!(
            record.get("note"),
            Some(&FieldValue::Character(Some("é".repeat(127))))
        );
    }

    #[test]
    fn test_character_value_fits_column() {
        let long = json!("ab".repeat(200));
        match field_value(Some(&long), FieldKind::Character) {
            FieldValue::Character(Some(s)) => assert_eq!(s.len(), CHARACTER_FIELD_LENGTH as usize),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_read_polygon_z_shapefile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patches.shp");

        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("name").unwrap(), 20);
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
        let ring = vec![
            PointZ::new(0.0, 0.0, 12.0, 0.0),
            PointZ::new(0.0, 1.0, 12.0, 0.0),
            PointZ::new(1.0, 1.0, 12.0, 0.0),
            PointZ::new(0.0, 0.0, 12.0, 0.0),
        ];
        let mut record = Record::default();
        record.insert(
            "name".to_string(),
            FieldValue::Character(Some("roof".to_string())),
        );
        writer
            .write_shape_and_record(&shapefile::PolygonZ::new(PolygonRing::Outer(ring)), &record)
            .unwrap();
        drop(writer);
        fs::write(path.with_extension("prj"), WGS84_PRJ).unwrap();

        let collection = read_shapefile(&path).unwrap();
        assert_eq!(collection.crs, Some(Crs::wgs84()));
        assert_eq!(collection.len(), 1);

        let feature = &collection.features[0];
        assert_eq!(feature.properties["name"], json!("roof"));
        assert_eq!(feature.geometry.ring_count(), 1);
        assert_eq!(feature.geometry.rings()[0][0].z, 12.0);
    }

    #[test]
    fn test_convert_patch_kinds() {
        let points = vec![
            PointZ::new(0.0, 0.0, 1.0, 0.0),
            PointZ::new(1.0, 0.0, 2.0, 0.0),
            PointZ::new(0.0, 1.0, 3.0, 0.0),
            PointZ::new(1.0, 1.0, 4.0, 0.0),
        ];
        let strip = convert_patch(&shapefile::Patch::TriangleStrip(points.clone()));
        assert_eq!(strip.rings().len(), 2);

        let ring = convert_patch(&shapefile::Patch::OuterRing(points));
        assert!(matches!(ring, Patch::OuterRing(ref r) if r.len() == 4 && r[3].z == 4.0));
    }

    #[test]
    fn test_field_names_are_unique() {
        let mut used = HashSet::new();
        assert_eq!(unique_field_name("building_height", &mut used), "building_h");
        assert_eq!(unique_field_name("building_hue", &mut used), "building_1");
        assert_eq!(unique_field_name("id", &mut used), "id");
    }

    #[test]
    fn test_mixed_values_fall_back_to_character() {
        let mut a = building("a", 1.0);
        a.properties.insert("code".to_string(), json!(12));
        let mut b = building("b", 2.0);
        b.properties.insert("code".to_string(), json!("12b"));
        let columns = infer_columns(&PolygonCollection::new(vec![a, b], None));

        let code = columns.iter().find(|c| c.key == "code").unwrap();
        assert_eq!(code.kind, FieldKind::Character);
        let height = columns.iter().find(|c| c.key == "height").unwrap();
        assert_eq!(height.kind, FieldKind::Numeric);
    }
}
