use std::fmt;
use std::str::FromStr;

/// Coordinate reference system identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    Epsg(u32),
    /// Anything we could not map to an EPSG code (kept verbatim for error messages)
    Other(String),
}

pub const WGS84: u32 = 4326;

impl Crs {
    pub fn wgs84() -> Self {
        Crs::Epsg(WGS84)
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Other(_) => None,
        }
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg() == Some(WGS84)
    }

    /// OGC URN, as written in the legacy GeoJSON `crs` member
    pub fn to_urn(&self) -> String {
        match self {
            Crs::Epsg(WGS84) => "urn:ogc:def:crs:OGC:1.3:CRS84".to_string(),
            Crs::Epsg(code) => format!("urn:ogc:def:crs:EPSG::{}", code),
            Crs::Other(name) => name.clone(),
        }
    }

    /// Recognize the CRS of a `.prj` file.
    ///
    /// # Algorithm
    /// 1. Trust an EPSG `AUTHORITY` / `ID` that belongs to the root node. Nested
    ///    ones name the base GEOGCS or a unit, never the CRS itself
    /// 2. Otherwise match ESRI PROJCS names: UTM zones and Web Mercator
    /// 3. A plain WGS84 GEOGCS is EPSG:4326
    pub fn from_wkt(wkt: &str) -> Self {
        let wkt = wkt.trim();

        if let Some(code) = root_epsg_authority(wkt) {
            return Crs::Epsg(code);
        }

        let upper = wkt.to_ascii_uppercase();
        if upper.starts_with("PROJCS") {
            let name = upper
                .split('"')
                .nth(1)
                .unwrap_or_default()
                .replace(' ', "_");
            if let Some(code) = utm_code_from_name(&name) {
                return Crs::Epsg(code);
            }
            if name.contains("WEB_MERCATOR") || name.contains("PSEUDO_MERCATOR") {
                return Crs::Epsg(3857);
            }
        } else if upper.starts_with("GEOGCS")
            && (upper.contains("WGS_1984") || upper.contains("WGS 84"))
        {
            return Crs::wgs84();
        }

        Crs::Other(wkt.to_string())
    }
}

fn root_epsg_authority(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let mut depth = 0usize;
    let mut quoted = false;

    for (i, byte) in upper.bytes().enumerate() {
        match byte {
            b'"' => quoted = !quoted,
            b'[' | b'(' if !quoted => depth += 1,
            b']' | b')' if !quoted => depth = depth.saturating_sub(1),
            b',' if !quoted && depth == 1 => {
                if let Some(code) = epsg_identifier(upper[i + 1..].trim_start()) {
                    return Some(code);
                }
            }
            _ => {}
        }
    }
    None
}

/// `AUTHORITY["EPSG","32633"]` (WKT1) or `ID["EPSG",32633]` (WKT2)
fn epsg_identifier(node: &str) -> Option<u32> {
    let args = node
        .strip_prefix("AUTHORITY")
        .or_else(|| node.strip_prefix("ID"))?
        .trim_start()
        .strip_prefix(['[', '('])?;
    let args = &args[..args.find([']', ')'])?];

    let mut parts = args.split(',').map(|part| part.trim().trim_matches('"'));
    if parts.next()? != "EPSG" {
        return None;
    }
    parts.next()?.parse().ok()
}

/// `WGS_1984_UTM_Zone_33N` -> 32633, `NAD_1983_UTM_Zone_10N` -> 26910
fn utm_code_from_name(name: &str) -> Option<u32> {
    let idx = name.find("UTM_ZONE_")?;
    let zone_part = &name[idx + "UTM_ZONE_".len()..];
    let digits: String = zone_part.chars().take_while(|c| c.is_ascii_digit()).collect();
    let zone: u32 = digits.parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    let south = zone_part[digits.len()..].starts_with('S');

    if name.contains("NAD_1983") || name.contains("NAD83") {
        if south || zone > 23 {
            return None;
        }
        Some(26900 + zone)
    } else if name.contains("WGS_1984") || name.contains("WGS_84") {
        Some(if south { 32700 + zone } else { 32600 + zone })
    } else {
        None
    }
}

impl FromStr for Crs {
    type Err = std::convert::Infallible;

    /// Accepts `EPSG:2263`, `2263`, `urn:ogc:def:crs:EPSG::2263` and `CRS84`.
    /// Anything else becomes [`Crs::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Crs::wgs84());
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest.parse().ok()
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            upper.rsplit(':').next().and_then(|c| c.parse().ok())
        } else {
            upper.parse().ok()
        };

        Ok(match code {
            Some(code) => Crs::Epsg(code),
            None => Crs::Other(trimmed.to_string()),
        })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Other(name) => f.write_str(name),
        }
    }
}

/// ESRI WKT written to the `.prj` sidecar of WGS84 output
pub const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
