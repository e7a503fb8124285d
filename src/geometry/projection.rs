use geo::{Coord, MapCoords, Polygon};

use super::crs::{Crs, WGS84};
use crate::domain::PolygonCollection;
use crate::error::{ConvertError, Result};

/// WGS84 ellipsoid semi-major axis in meters
const SEMI_MAJOR: f64 = 6_378_137.0;
/// WGS84 flattening
const FLATTENING: f64 = 1.0 / 298.257_223_563;
/// UTM scale factor on the central meridian
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Inverse projection from a source CRS to WGS84 longitude/latitude
///
/// Built-in fast paths cover the CRSs multipatch exports usually come in:
/// - geographic WGS84 / NAD83 (identity, datum shift below a meter)
/// - spherical Web Mercator
/// - WGS84 and NAD83 UTM zones. NAD83 zones reuse the WGS84 ellipsoid; GRS80
///   differs from it by well under a millimeter at these scales
///
/// Every other EPSG code, and PROJ.4 strings, go through [`Definition`].
/// With the `proj` feature, codes it does not know fall back to PROJ.
pub enum Reprojector {
    Identity,
    WebMercator,
    Utm { zone: u32, south: bool },
    Definition(Box<Definition>),
    #[cfg(feature = "proj")]
    Proj(Box<proj::Proj>),
}

/// A proj4rs transform from a PROJ.4 definition into WGS84
pub struct Definition {
    source: proj4rs::Proj,
    target: proj4rs::Proj,
    /// Geographic sources take radians in and the CLI gives degrees
    geographic: bool,
}

impl Definition {
    pub fn from_proj4(definition: &str) -> Option<Self> {
        let source = proj4rs::Proj::from_proj_string(definition).ok()?;
        let target = proj4rs::Proj::from_proj_string(WGS84_PROJ4).ok()?;
        let geographic = ["+proj=longlat", "+proj=latlong", "+proj=lonlat", "+proj=latlon"]
            .iter()
            .any(|p| definition.contains(p));

        Some(Self {
            source,
            target,
            geographic,
        })
    }

    /// Look the EPSG code up in the bundled definition table
    pub fn from_epsg(code: u32) -> Option<Self> {
        let code = u16::try_from(code).ok()?;
        let def = crs_definitions::from_code(code)?;
        Self::from_proj4(def.proj4)
    }

    fn transform(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let mut point = if self.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.source, &self.target, &mut point).ok()?;
        Some((point.0.to_degrees(), point.1.to_degrees()))
    }
}

impl Reprojector {
    /// Build the transform from `source` to EPSG:4326
    pub fn new(source: &Crs) -> Result<Self> {
        let code = match source {
            Crs::Epsg(code) => *code,
            Crs::Other(name) if name.trim_start().starts_with("+proj=") => {
                return Definition::from_proj4(name)
                    .map(|def| Reprojector::Definition(Box::new(def)))
                    .ok_or_else(|| ConvertError::UnsupportedCrs(name.clone()));
            }
            Crs::Other(name) => return Err(ConvertError::UnsupportedCrs(name.clone())),
        };

        match code {
            WGS84 | 4269 => Ok(Reprojector::Identity),
            3857 | 900913 | 102100 | 102113 => Ok(Reprojector::WebMercator),
            32601..=32660 => Ok(Reprojector::Utm {
                zone: code - 32600,
                south: false,
            }),
            32701..=32760 => Ok(Reprojector::Utm {
                zone: code - 32700,
                south: true,
            }),
            26901..=26923 => Ok(Reprojector::Utm {
                zone: code - 26900,
                south: false,
            }),
            _ => match Definition::from_epsg(code) {
                Some(def) => Ok(Reprojector::Definition(Box::new(def))),
                None => Self::fallback(code),
            },
        }
    }

    #[cfg(feature = "proj")]
    fn fallback(code: u32) -> Result<Self> {
        proj::Proj::new_known_crs(&format!("EPSG:{}", code), "EPSG:4326", None)
            .map(|p| Reprojector::Proj(Box::new(p)))
            .map_err(|_| ConvertError::UnsupportedCrs(format!("EPSG:{}", code)))
    }

    #[cfg(not(feature = "proj"))]
    fn fallback(code: u32) -> Result<Self> {
        Err(ConvertError::UnsupportedCrs(format!("EPSG:{}", code)))
    }

    /// Transform one coordinate; `None` when the coordinate is outside the projection's domain
    pub fn transform(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (lon, lat) = match self {
            Reprojector::Identity => (x, y),
            Reprojector::WebMercator => web_mercator_inverse(x, y),
            Reprojector::Utm { zone, south } => utm_inverse(x, y, *zone, *south),
            Reprojector::Definition(def) => def.transform(x, y)?,
            #[cfg(feature = "proj")]
            Reprojector::Proj(p) => p.convert((x, y)).ok()?,
        };

        if lon.is_finite() && lat.is_finite() {
            Some((lon, lat))
        } else {
            None
        }
    }

    pub fn transform_polygon(&self, polygon: &Polygon<f64>, crs: &Crs) -> Result<Polygon<f64>> {
        polygon.try_map_coords(|c: Coord<f64>| {
            self.transform(c.x, c.y)
                .map(|(x, y)| Coord { x, y })
                .ok_or_else(|| ConvertError::Projection {
                    crs: crs.to_string(),
                    x: c.x,
                    y: c.y,
                })
        })
    }
}

fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / SEMI_MAJOR).to_degrees();
    let lat = (2.0 * (y / SEMI_MAJOR).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Transverse Mercator inverse (Snyder, "Map Projections: A Working Manual", p. 63)
fn utm_inverse(easting: f64, northing: f64, zone: u32, south: bool) -> (f64, f64) {
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let ep2 = e2 / (1.0 - e2);
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let x = easting - UTM_FALSE_EASTING;
    let y = if south {
        northing - UTM_FALSE_NORTHING_SOUTH
    } else {
        northing
    };

    let m = y / UTM_K0;
    let mu = m / (SEMI_MAJOR * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    // footpoint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = phi1.sin_cos();
    let tan1 = sin1 / cos1;
    let c1 = ep2 * cos1.powi(2);
    let t1 = tan1.powi(2);
    let w = 1.0 - e2 * sin1.powi(2);
    let n1 = SEMI_MAJOR / w.sqrt();
    let r1 = SEMI_MAJOR * (1.0 - e2) / w.powf(1.5);
    let d = x / (n1 * UTM_K0);

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                    - 252.0 * ep2
                    - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon0 = (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;
    let dlon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
            * d.powi(5)
            / 120.0)
        / cos1;

    (lon0 + dlon.to_degrees(), lat.to_degrees())
}

impl PolygonCollection {
    /// Reproject every polygon into `target`.
    ///
    /// Only WGS84 is supported as a target; the source must be known.
    pub fn to_crs(self, target: &Crs) -> Result<Self> {
        let source = self.crs.clone().ok_or(ConvertError::MissingCrs)?;
        if &source == target {
            return Ok(self);
        }
        if !target.is_wgs84() {
            return Err(ConvertError::UnsupportedCrs(target.to_string()));
        }

        let reprojector = Reprojector::new(&source)?;
        let features = self
            .features
            .into_iter()
            .map(|mut feature| {
                feature.geometry = reprojector.transform_polygon(&feature.geometry, &source)?;
                Ok(feature)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(features, Some(target.clone())))
    }
}
