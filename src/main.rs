use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

use multipatch2d::config::{FileConfig, Overrides};
use multipatch2d::domain::RingSource;
use multipatch2d::io::geojson_file::to_geojson;
use multipatch2d::{OutputTarget, io, multipatch_to_polygons};

/// Convert ESRI Multipatch features into flat 2D polygons with a height attribute
///
/// Examples:
///   # Print WGS84 GeoJSON polygons for a multipatch shapefile
///   multipatch2d buildings.shp
///
///   # Heights relative to each building's base, feet to meters, saved as a shapefile
///   multipatch2d buildings.shp --z-unit-in ft --z-unit-out m --relative-height \
///       --save --path out/ --filename buildings --format shp
///
///   # GeoJSON input without a crs member, in UTM zone 33N
///   multipatch2d city.geojson --source-crs EPSG:32633 --save
#[derive(Parser, Debug)]
#[command(name = "multipatch2d")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file (.shp multipatch / PolygonZ, or .geojson with 3D coordinates)
    input: PathBuf,

    /// Path to config file (optional, auto-searches multipatch2d.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Height unit of the input z coordinates: m or ft
    #[arg(long)]
    z_unit_in: Option<String>,

    /// Height unit of the output height attribute: m or ft
    #[arg(long)]
    z_unit_out: Option<String>,

    /// Subtract each feature's lowest height from all of its polygons
    #[arg(short = 'r', long)]
    relative_height: bool,

    /// CRS of the input, overriding the one declared in the file (e.g. EPSG:32633)
    #[arg(long)]
    source_crs: Option<String>,

    /// Write the result to a file instead of printing GeoJSON to stdout
    #[arg(short = 's', long)]
    save: bool,

    /// Output directory
    #[arg(long)]
    path: Option<PathBuf>,

    /// Output file name, without extension
    #[arg(long)]
    filename: Option<String>,

    /// Output format: geojson or shp
    #[arg(short = 'f', long)]
    format: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let file_config: FileConfig = if let Some(ref config_path) = args.config {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config file: {:?}", config_path))?;
            toml::from_str(&contents).context("Failed to parse config file")?
        } else {
            bail!("Config file not found: {:?}", config_path);
        }
    } else {
        FileConfig::load().unwrap_or_default()
    };

    let overrides = Overrides {
        z_unit_in: args.z_unit_in.clone(),
        z_unit_out: args.z_unit_out.clone(),
        relative_h: args.relative_height,
        source_crs: args.source_crs.clone(),
        save: args.save,
        path: args.path.clone(),
        filename: args.filename.clone(),
        out_format: args.format.clone(),
        verbose: args.verbose,
    };
    let settings = file_config
        .resolve(&overrides)
        .context("Invalid conversion settings")?;
    let verbose = settings.verbose;

    if !args.input.exists() {
        bail!("Input file not found: {}", args.input.display());
    }

    if verbose {
        eprintln!("multipatch2d - Multipatch to 2D polygons");
        eprintln!("========================================");
        eprintln!();
        eprintln!("Configuration:");
        eprintln!("  Input: {}", args.input.display());
        eprintln!(
            "  Height units: {} -> {}",
            settings.options.z_unit_in, settings.options.z_unit_out
        );
        eprintln!("  Relative height: {}", settings.options.relative_height);
        if let Some(ref crs) = settings.source_crs {
            eprintln!("  Source CRS override: {}", crs);
        }
        match settings.target {
            OutputTarget::InMemory => eprintln!("  Output: stdout (GeoJSON)"),
            OutputTarget::File(ref destination) => {
                eprintln!("  Output: {}", destination.file_path().display())
            }
        }
        eprintln!();
    }

    let spinner = create_spinner("Reading multipatch features...");
    let start = Instant::now();
    let mut input = abandon_on_err(&spinner, io::read(&args.input))
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;
    if let Some(crs) = settings.source_crs.clone() {
        input.crs = Some(crs);
    }
    let ring_count: usize = input.iter().map(|f| f.geometry.ring_count()).sum();
    spinner.finish_with_message(format!(
        "Read {} features with {} rings [{:.1}s]",
        input.len(),
        ring_count,
        start.elapsed().as_secs_f32()
    ));

    if verbose {
        match input.crs {
            Some(ref crs) => eprintln!("  Source CRS: {}", crs),
            None => eprintln!("  Source CRS: unknown"),
        }
    }

    let spinner = create_spinner("Converting to 2D polygons...");
    let start = Instant::now();
    let output = abandon_on_err(
        &spinner,
        multipatch_to_polygons(&input, &settings.options, &settings.target),
    )
    .context("Failed to convert multipatch features")?;
    spinner.finish_with_message(format!(
        "Converted {} polygons to EPSG:4326 [{:.1}s]",
        ring_count,
        start.elapsed().as_secs_f32()
    ));

    match output {
        Some(collection) => {
            let geojson = serde_json::to_string_pretty(&to_geojson(&collection))
                .context("Failed to serialize GeoJSON")?;
            println!("{}", geojson);
        }
        None => {
            if let OutputTarget::File(ref destination) = settings.target {
                eprintln!("Output: {}", destination.file_path().display());
            }
        }
    }

    if verbose {
        eprintln!(
            "Done! Total time: {:.1}s",
            total_start.elapsed().as_secs_f32()
        );
    }

    Ok(())
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Leave the spinner where it stopped when the step failed
fn abandon_on_err<T, E>(
    spinner: &ProgressBar,
    result: std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    result.inspect_err(|_| spinner.abandon())
}
