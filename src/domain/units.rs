use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

const FEET_PER_METER: f64 = 3.28084;
const METERS_PER_FOOT: f64 = 0.3048;

/// Unit of the z coordinate / height attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum HeightUnit {
    #[default]
    Meters,
    Feet,
}

impl HeightUnit {
    /// Factor that turns a value in `self` into a value in `to`
    pub fn factor_to(self, to: HeightUnit) -> f64 {
        match (self, to) {
            (HeightUnit::Meters, HeightUnit::Feet) => FEET_PER_METER,
            (HeightUnit::Feet, HeightUnit::Meters) => METERS_PER_FOOT,
            _ => 1.0,
        }
    }

    /// Convert a height from `self` into `to`
    pub fn convert(self, value: f64, to: HeightUnit) -> f64 {
        if self == to {
            value
        } else {
            value * self.factor_to(to)
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            HeightUnit::Meters => "m",
            HeightUnit::Feet => "ft",
        }
    }
}

impl FromStr for HeightUnit {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(HeightUnit::Meters),
            "ft" => Ok(HeightUnit::Feet),
            other => Err(ConvertError::InvalidUnit(other.to_string())),
        }
    }
}

impl TryFrom<String> for HeightUnit {
    type Error = ConvertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for HeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_units() {
        assert_eq!("m".parse::<HeightUnit>().unwrap(), HeightUnit::Meters);
        assert_eq!("ft".parse::<HeightUnit>().unwrap(), HeightUnit::Feet);
    }

    #[test]
    fn test_unknown_unit_names_value() {
        let err = "km".parse::<HeightUnit>().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidUnit(ref u) if u == "km"));
        assert!(err.to_string().contains("'km'"));
    }

    #[test]
    fn test_convert() {
        assert_relative_eq!(
            HeightUnit::Meters.convert(10.0, HeightUnit::Feet),
            32.8084,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            HeightUnit::Feet.convert(10.0, HeightUnit::Meters),
            3.048,
            epsilon = 1e-12
        );
        assert_eq!(HeightUnit::Feet.convert(7.5, HeightUnit::Feet), 7.5);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        for h in [0.0, 1.0, 12.5, 431.7, -3.2] {
            let ft = HeightUnit::Meters.convert(h, HeightUnit::Feet);
            let back = HeightUnit::Feet.convert(ft, HeightUnit::Meters);
            // the two factors are not exact inverses
            assert_relative_eq!(back, h, epsilon = 1e-9, max_relative = 1e-7);
        }
    }
}
