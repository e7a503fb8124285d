pub mod feature;
pub mod format;
pub mod multipatch;
pub mod units;

pub use feature::{Feature, FeatureCollection, PolygonCollection, Properties};
pub use format::OutputFormat;
pub use multipatch::{Multipatch, Patch, Ring, RingSource, Vertex};
pub use units::HeightUnit;
