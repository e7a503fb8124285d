pub mod geojson_file;
pub mod shp;

use std::path::Path;

use crate::convert::Destination;
use crate::domain::{FeatureCollection, Multipatch, OutputFormat, PolygonCollection};
use crate::error::{ConvertError, Result};

pub use geojson_file::{parse_geojson, read_geojson, write_geojson};
pub use shp::{read_shapefile, write_shapefile};

/// Load a multipatch collection, picking the reader from the file extension
pub fn read(path: &Path) -> Result<FeatureCollection<Multipatch>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("geojson") | Some("json") => read_geojson(path),
        Some("shp") => read_shapefile(path),
        _ => Err(ConvertError::UnsupportedInput(path.display().to_string())),
    }
}

/// Persist a converted collection to `destination`
pub fn write(collection: &PolygonCollection, destination: &Destination) -> Result<()> {
    let path = destination.file_path();
    match destination.format {
        OutputFormat::GeoJson => write_geojson(collection, &path),
        OutputFormat::Shapefile => write_shapefile(collection, &path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_rejects_unknown_extension() {
        let err = read(Path::new("buildings.kml")).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedInput(_)));
    }
}
