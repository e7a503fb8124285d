use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// File format for persisted output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    GeoJson,
    Shapefile,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::GeoJson => "geojson",
            OutputFormat::Shapefile => "shp",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geojson" => Ok(OutputFormat::GeoJson),
            "shp" | "shapefile" => Ok(OutputFormat::Shapefile),
            other => Err(ConvertError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
