//! bundsim CLI - detainment bund site simulation and catchment ranking

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bundsim_algorithms::bunds::{
    rank_sites, simulate_sites, CatchmentParams, FlowAccUnits, SiteInputs, SiteParams,
};
use bundsim_core::io::{read_geojson, read_geotiff, write_geojson, write_geotiff, GeoTiffOptions};
use bundsim_core::{D8Encoding, FeatureCollection, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bundsim")]
#[command(author, version, about = "Detainment bund site simulation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Place bund sites along a flow-line network
    Sites {
        /// Unfilled DEM
        #[arg(long)]
        dem: PathBuf,
        /// Flow accumulation raster
        #[arg(long)]
        flow_acc: PathBuf,
        /// Flow-line network (GeoJSON lines)
        #[arg(long)]
        network: PathBuf,
        /// Perennial streams (GeoJSON lines)
        #[arg(long)]
        perennial: Option<PathBuf>,
        /// Field polygons (GeoJSON)
        #[arg(long)]
        fields: Option<PathBuf>,
        /// Numeric attribute selecting field polygons (default isAG)
        #[arg(long, requires = "fields")]
        field_attr: Option<String>,
        /// Treat every field polygon as a field
        #[arg(long, requires = "fields", conflicts_with = "field_attr")]
        all_fields: bool,
        /// Catchment boundary polygons (GeoJSON)
        #[arg(long)]
        catchment: Option<PathBuf>,
        /// Minimum value of the field attribute
        #[arg(long, requires = "fields", conflicts_with = "all_fields")]
        field_min: Option<f64>,
        /// Output site lines (GeoJSON)
        #[arg(short, long)]
        output: PathBuf,
        /// Optional output of all simulated points (GeoJSON)
        #[arg(long)]
        points: Option<PathBuf>,
        /// Station spacing along the network
        #[arg(long)]
        spacing: Option<f64>,
        /// Bund height (m)
        #[arg(long)]
        height: Option<f64>,
        /// Bund length
        #[arg(long)]
        length: Option<f64>,
        /// Z-factor for unit conversion
        #[arg(short, long)]
        z_factor: Option<f64>,
        /// Remove sites with unsuitable bank incision
        #[arg(long)]
        eliminate_incised: bool,
        /// Network does not come from the matching flow-path stage
        #[arg(long)]
        external_network: bool,
        /// Flow accumulation units: cells, m2, ha
        #[arg(long)]
        acc_units: Option<FlowAccUnits>,
        /// Memory limit (MB)
        #[arg(long)]
        memory: Option<u32>,
        /// JSON parameter file; flags override its values
        #[arg(long)]
        params: Option<PathBuf>,
    },
    /// Simulate and rank the catchments of a site layer
    Catchments {
        /// Site lines (GeoJSON)
        #[arg(long)]
        sites: PathBuf,
        /// Filled DEM
        #[arg(long)]
        filled_dem: PathBuf,
        /// D8 flow direction raster
        #[arg(long)]
        flow_dir: PathBuf,
        /// Flow direction encoding: native, esri, grass
        #[arg(long)]
        d8_encoding: Option<D8Encoding>,
        /// Output ranked catchments (GeoJSON)
        #[arg(short, long)]
        output: PathBuf,
        /// Optional output depth raster
        #[arg(long)]
        depth: Option<PathBuf>,
        /// Z-factor for unit conversion
        #[arg(short, long)]
        z_factor: Option<f64>,
        /// Memory limit (MB)
        #[arg(long)]
        memory: Option<u32>,
        /// Chaikin smoothing iterations for catchment polygons
        #[arg(long)]
        smooth: Option<usize>,
        /// JSON parameter file; flags override its values
        #[arg(long)]
        params: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid spinner template")?,
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

fn read_raster<T: bundsim_core::RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner(&format!("Reading {}...", path.display()))?;
    let raster: Raster<T> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} x {}", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

fn read_layer(path: &Path) -> Result<FeatureCollection> {
    let pb = spinner(&format!("Reading {}...", path.display()))?;
    let layer = read_geojson(path)
        .with_context(|| format!("Failed to read layer {}", path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} features", path.display(), layer.len());
    Ok(layer)
}

fn write_layer(layer: &FeatureCollection, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...")?;
    write_geojson(layer, path).with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn write_raster(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...")?;
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn load_params<P: DeserializeOwned + Default>(path: Option<&Path>) -> Result<P> {
    match path {
        None => Ok(P::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid parameter file {}", path.display()))
        }
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let raster: Raster<f64> = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        Commands::Sites {
            dem,
            flow_acc,
            network,
            perennial,
            fields,
            field_attr,
            all_fields,
            catchment,
            field_min,
            output,
            points,
            spacing,
            height,
            length,
            z_factor,
            eliminate_incised,
            external_network,
            acc_units,
            memory,
            params,
        } => {
            let mut p: SiteParams = load_params(params.as_deref())?;
            if let Some(v) = spacing {
                p.spacing = v;
            }
            if let Some(v) = height {
                p.height = v;
            }
            if let Some(v) = length {
                p.length = v;
            }
            if let Some(v) = z_factor {
                p.z_factor = v;
            }
            if let Some(v) = acc_units {
                p.acc_units = v;
            }
            if let Some(v) = memory {
                p.memory_mb = v;
            }
            if field_attr.is_some() {
                p.field_attribute = field_attr;
            }
            if all_fields {
                p.field_attribute = None;
            }
            if let Some(v) = field_min {
                p.field_min = v;
            }
            p.eliminate_incised |= eliminate_incised;
            if external_network {
                p.matched_network = false;
            }

            let dem: Raster<f64> = read_raster(&dem)?;
            let flow_acc: Raster<f64> = read_raster(&flow_acc)?;
            let network = read_layer(&network)?;
            let perennial = perennial.as_deref().map(read_layer).transpose()?;
            let fields = fields.as_deref().map(read_layer).transpose()?;
            let catchment = catchment.as_deref().map(read_layer).transpose()?;

            let inputs = SiteInputs {
                dem: &dem,
                flow_acc: &flow_acc,
                network: &network,
                perennial: perennial.as_ref(),
                fields: fields.as_ref(),
                catchment: catchment.as_ref(),
            };

            let start = Instant::now();
            let pb = spinner("Simulating sites...")?;
            let result = simulate_sites(&inputs, &p);
            pb.finish_and_clear();
            let out = result.context("Site simulation failed")?;
            let elapsed = start.elapsed();

            write_layer(&out.site_features(), &output)?;
            if let Some(path) = points {
                write_layer(&out.point_features(), &path)?;
            }
            println!("{} sites", out.sites.len());
            done("Sites", &output, elapsed);
        }

        Commands::Catchments {
            sites,
            filled_dem,
            flow_dir,
            d8_encoding,
            output,
            depth,
            z_factor,
            memory,
            smooth,
            params,
        } => {
            let mut p: CatchmentParams = load_params(params.as_deref())?;
            if let Some(v) = d8_encoding {
                p.d8_encoding = v;
            }
            if let Some(v) = z_factor {
                p.z_factor = v;
            }
            if let Some(v) = memory {
                p.memory_mb = v;
            }
            if let Some(v) = smooth {
                p.smooth_iterations = v;
            }

            let layer = read_layer(&sites)?;
            let filled: Raster<f64> = read_raster(&filled_dem)?;
            let fdir: Raster<i32> = read_raster(&flow_dir)?;

            let start = Instant::now();
            let pb = spinner("Simulating catchments...")?;
            let result = rank_sites(&layer, &filled, &fdir, &p);
            pb.finish_and_clear();
            let (out, features) = result.context("Catchment simulation failed")?;
            let elapsed = start.elapsed();

            write_layer(&features, &output)?;
            if let Some(path) = depth {
                write_raster(&out.depth, &path)?;
            }
            println!(
                "{} catchments ranked, {} sites dropped",
                out.report.ranked,
                out.report.dropped()
            );
            if let Some(best) = out.catchments.first() {
                println!("  Best: DB_ID {} ratio {:.2}", best.db_id, best.ratio);
            }
            done("Catchments", &output, elapsed);
        }
    }

    Ok(())
}
