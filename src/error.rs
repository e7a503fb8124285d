use thiserror::Error;

/// Errors raised while converting multipatch features
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Height unit outside of `m` / `ft`
    #[error("invalid height unit '{0}': expected 'm' or 'ft'")]
    InvalidUnit(String),

    /// Output format outside of `geojson` / `shp`
    #[error("invalid output format '{0}': expected 'geojson' or 'shp'")]
    InvalidFormat(String),

    #[error("feature collection has no coordinate reference system")]
    MissingCrs,

    #[error("unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),

    #[error("coordinate ({x}, {y}) could not be reprojected from {crs}")]
    Projection { crs: String, x: f64, y: f64 },

    #[error("invalid geometry in feature {feature}: {reason}")]
    InvalidGeometry { feature: usize, reason: String },

    #[error("unsupported input file '{0}': expected .geojson, .json or .shp")]
    UnsupportedInput(String),

    #[error("property '{0}' cannot be stored as a shapefile attribute")]
    InvalidField(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    GeoJson(#[from] Box<geojson::Error>),

    #[error(transparent)]
    Shapefile(#[from] shapefile::Error),
}

impl From<geojson::Error> for ConvertError {
    fn from(err: geojson::Error) -> Self {
        ConvertError::GeoJson(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
