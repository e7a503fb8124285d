//! multipatch2d - Convert ESRI Multipatch features into flat 2D polygons with a height attribute

pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod io;

pub use convert::{
    ConvertOptions, Destination, OutputTarget, convert, decompose, multipatch_to_polygons,
};
pub use domain::{Feature, FeatureCollection, HeightUnit, Multipatch, OutputFormat, PolygonCollection};
pub use error::ConvertError;
pub use geometry::Crs;
