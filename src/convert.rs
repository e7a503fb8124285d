use geo::{LineString, Polygon};
use std::path::PathBuf;

use crate::domain::{
    Feature, FeatureCollection, HeightUnit, OutputFormat, PolygonCollection, Ring, RingSource,
};
use crate::error::{ConvertError, Result};
use crate::geometry::Crs;
use crate::io;

/// Height handling for one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    /// Unit of the input z coordinates
    pub z_unit_in: HeightUnit,
    /// Unit of the output `height` attribute
    pub z_unit_out: HeightUnit,
    /// Subtract each feature's lowest ring height from all of its rings
    pub relative_height: bool,
}

/// Where a persisted result goes: `<dir>/<filename>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub dir: PathBuf,
    pub filename: String,
    pub format: OutputFormat,
}

impl Destination {
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            filename: filename.into(),
            format,
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.filename, self.format.extension()))
    }
}

impl Default for Destination {
    fn default() -> Self {
        Self::new("./", "output", OutputFormat::GeoJson)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    #[default]
    InMemory,
    File(Destination),
}

/// Split multipatch features into one flat polygon per ring.
///
/// # Algorithm
/// 1. Walk every feature's rings in encounter order
/// 2. Take the first vertex's z as the ring height and drop z from the outline
/// 3. Track the lowest height of the feature; subtract it when `relative_height` is set
/// 4. Convert heights into the output unit
///
/// The result keeps the source CRS; see [`convert`] for the reprojected output.
pub fn decompose<G: RingSource>(
    input: &FeatureCollection<G>,
    options: &ConvertOptions,
) -> Result<PolygonCollection> {
    let crs = input.crs.clone();
    let mut features = Vec::new();

    for (index, feature) in input.features.iter().enumerate() {
        let mut split = Vec::new();
        let mut min_height: Option<f64> = None;

        for ring in feature.geometry.rings() {
            let height = ring_height(&ring).ok_or_else(|| ConvertError::InvalidGeometry {
                feature: index,
                reason: "ring has no vertices".to_string(),
            })?;

            min_height = Some(match min_height {
                Some(min) if min <= height => min,
                _ => height,
            });

            split.push((height, flatten_ring(&ring)));
        }

        let offset = if options.relative_height {
            min_height.unwrap_or(0.0)
        } else {
            0.0
        };

        for (height, polygon) in split {
            let height = options
                .z_unit_in
                .convert(height - offset, options.z_unit_out);

            let mut properties = feature.properties.clone();
            properties.insert("height".to_string(), serde_json::Value::from(height));
            features.push(Feature::new(properties, polygon));
        }
    }

    Ok(FeatureCollection::new(features, crs))
}

/// [`decompose`], then reproject the polygons to WGS84 longitude/latitude
pub fn convert<G: RingSource>(
    input: &FeatureCollection<G>,
    options: &ConvertOptions,
) -> Result<PolygonCollection> {
    decompose(input, options)?.to_crs(&Crs::wgs84())
}

/// Convert a multipatch collection and either return it or write it out.
///
/// Returns `Some(collection)` for [`OutputTarget::InMemory`] and `None` once the
/// file has been written.
pub fn multipatch_to_polygons<G: RingSource>(
    input: &FeatureCollection<G>,
    options: &ConvertOptions,
    target: &OutputTarget,
) -> Result<Option<PolygonCollection>> {
    let output = convert(input, options)?;

    match target {
        OutputTarget::InMemory => Ok(Some(output)),
        OutputTarget::File(destination) => {
            io::write(&output, destination)?;
            Ok(None)
        }
    }
}

fn ring_height(ring: &Ring) -> Option<f64> {
    ring.first().map(|v| v.z)
}

fn flatten_ring(ring: &Ring) -> Polygon<f64> {
    let exterior: LineString<f64> = ring.iter().map(|v| (v.x, v.y)).collect();
    Polygon::new(exterior, Vec::new())
}
