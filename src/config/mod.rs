use serde::Deserialize;
use std::path::PathBuf;

use crate::convert::{ConvertOptions, Destination, OutputTarget};
use crate::domain::{HeightUnit, OutputFormat};
use crate::error::ConvertError;
use crate::geometry::Crs;

fn default_path() -> PathBuf {
    PathBuf::from("./")
}
fn default_filename() -> String {
    "output".to_string()
}
fn default_out_format() -> String {
    "geojson".to_string()
}

/// Settings read from `multipatch2d.toml`
///
/// ```toml
/// z_unit_in = "ft"
/// z_unit_out = "m"
/// relative_h = true
/// source_crs = "EPSG:32633"
///
/// save = true
/// path = "out/"
/// filename = "buildings"
/// out_format = "shp"
/// ```
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub z_unit_in: Option<HeightUnit>,
    #[serde(default)]
    pub z_unit_out: Option<HeightUnit>,
    #[serde(default)]
    pub relative_h: bool,
    #[serde(default)]
    pub source_crs: Option<String>,
    #[serde(default)]
    pub save: bool,
    #[serde(default = "default_path")]
    pub path: PathBuf,
    #[serde(default = "default_filename")]
    pub filename: String,
    /// Only validated when `save` is set
    #[serde(default = "default_out_format")]
    pub out_format: String,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            z_unit_in: None,
            z_unit_out: None,
            relative_h: false,
            source_crs: None,
            save: false,
            path: default_path(),
            filename: default_filename(),
            out_format: default_out_format(),
            verbose: false,
        }
    }
}

impl FileConfig {
    pub fn load() -> Option<Self> {
        let config_paths = get_config_paths();

        for path in config_paths {
            if !path.exists() {
                continue;
            }
            if let Ok(contents) = std::fs::read_to_string(&path) {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("multipatch2d.toml"));
    paths.push(PathBuf::from(".multipatch2d.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("multipatch2d").join("config.toml"));
        paths.push(config_dir.join("multipatch2d.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".multipatch2d.toml"));
    }

    paths
}

/// Values given on the command line; each one wins over the config file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub z_unit_in: Option<String>,
    pub z_unit_out: Option<String>,
    pub relative_h: bool,
    pub source_crs: Option<String>,
    pub save: bool,
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
    pub out_format: Option<String>,
    pub verbose: bool,
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub options: ConvertOptions,
    pub target: OutputTarget,
    /// Replaces whatever CRS the input file declares
    pub source_crs: Option<Crs>,
    pub verbose: bool,
}

impl FileConfig {
    /// Merge command line overrides into this config and validate units / format
    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings, ConvertError> {
        let z_unit_in = match &overrides.z_unit_in {
            Some(unit) => unit.parse()?,
            None => self.z_unit_in.unwrap_or_default(),
        };
        let z_unit_out = match &overrides.z_unit_out {
            Some(unit) => unit.parse()?,
            None => self.z_unit_out.unwrap_or_default(),
        };

        let save = overrides.save || self.save;
        let target = if save {
            let format: OutputFormat = overrides
                .out_format
                .as_deref()
                .unwrap_or(&self.out_format)
                .parse()?;
            OutputTarget::File(Destination::new(
                overrides.path.clone().unwrap_or_else(|| self.path.clone()),
                overrides
                    .filename
                    .clone()
                    .unwrap_or_else(|| self.filename.clone()),
                format,
            ))
        } else {
            OutputTarget::InMemory
        };

        let source_crs = overrides
            .source_crs
            .as_ref()
            .or(self.source_crs.as_ref())
            .and_then(|crs| crs.parse::<Crs>().ok());

        Ok(Settings {
            options: ConvertOptions {
                z_unit_in,
                z_unit_out,
                relative_height: overrides.relative_h || self.relative_h,
            },
            target,
            source_crs,
            verbose: overrides.verbose || self.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = FileConfig::default().resolve(&Overrides::default()).unwrap();
        assert_eq!(settings.options, ConvertOptions::default());
        assert_eq!(settings.target, OutputTarget::InMemory);
        assert_eq!(settings.source_crs, None);
    }

    #[test]
    fn test_parse_toml() {
        let config: FileConfig = toml::from_str(
            r#"
            z_unit_in = "ft"
            relative_h = true
            save = true
            filename = "buildings"
            out_format = "shp"
            source_crs = "EPSG:32618"
            "#,
        )
        .unwrap();

        let settings = config.resolve(&Overrides::default()).unwrap();
        assert_eq!(settings.options.z_unit_in, HeightUnit::Feet);
        assert_eq!(settings.options.z_unit_out, HeightUnit::Meters);
        assert!(settings.options.relative_height);
        assert_eq!(settings.source_crs, Some(Crs::Epsg(32618)));
        assert_eq!(
            settings.target,
            OutputTarget::File(Destination::new("./", "buildings", OutputFormat::Shapefile))
        );
    }

    #[test]
    fn test_bad_unit_in_toml() {
        let result: Result<FileConfig, _> = toml::from_str(r#"z_unit_out = "km""#);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("km"));
    }

    #[test]
    fn test_overrides_win() {
        let config = FileConfig {
            z_unit_in: Some(HeightUnit::Feet),
            out_format: "shp".to_string(),
            ..FileConfig::default()
        };
        let overrides = Overrides {
            z_unit_in: Some("m".to_string()),
            z_unit_out: Some("ft".to_string()),
            save: true,
            out_format: Some("geojson".to_string()),
            path: Some(PathBuf::from("/tmp/out")),
            ..Overrides::default()
        };

        let settings = config.resolve(&overrides).unwrap();
        assert_eq!(settings.options.z_unit_in, HeightUnit::Meters);
        assert_eq!(settings.options.z_unit_out, HeightUnit::Feet);
        match settings.target {
            OutputTarget::File(destination) => {
                assert_eq!(destination.format, OutputFormat::GeoJson);
                assert_eq!(destination.dir, PathBuf::from("/tmp/out"));
                assert_eq!(destination.filename, "output");
            }
            OutputTarget::InMemory => panic!("expected a file target"),
        }
    }

    #[test]
    fn test_invalid_unit_override() {
        let overrides = Overrides {
            z_unit_out: Some("km".to_string()),
            ..Overrides::default()
        };
        let err = FileConfig::default().resolve(&overrides).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidUnit(ref u) if u == "km"));
    }

    #[test]
    fn test_format_checked_only_when_saving() {
        let overrides = Overrides {
            out_format: Some("kml".to_string()),
            ..Overrides::default()
        };
        assert!(FileConfig::default().resolve(&overrides).is_ok());

        let saving = Overrides {
            save: true,
            ..overrides
        };
        let err = FileConfig::default().resolve(&saving).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidFormat(ref f) if f == "kml"));
    }
}
