pub mod crs;
pub mod projection;

pub use crs::Crs;
pub use projection::Reprojector;
