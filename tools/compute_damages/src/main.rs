/// Sea-level damage tool: intersects every UAT and county with the 22
/// flood-extent scenarios and writes the enriched region collections.
///
/// Inputs:  {regions_dir}/uats.json, {regions_dir}/counties.json,
///          the building inventory, {sea_levels_dir}/{-0.3 .. 1.8}.json
/// Outputs: {output_dir}/enhancedUATs.json, {output_dir}/enhancedCounties.json
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tidemark_core::{load_assets, AssetPaths, DamagePipeline};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "compute_damages",
    about = "Compute per-region flood damages for each sea-level scenario"
)]
struct Args {
    /// Directory containing uats.json and counties.json
    #[arg(long, default_value = "data/regions")]
    regions_dir: PathBuf,

    /// Building inventory JSON
    #[arg(long, default_value = "generated/floodedBuildings.json")]
    buildings: PathBuf,

    /// Directory containing one flood-extent document per sea level
    #[arg(long, default_value = "public/data")]
    sea_levels_dir: PathBuf,

    /// Output directory for the enriched collections (created if absent)
    #[arg(short, long, default_value = "generated")]
    output_dir: PathBuf,
}

impl Args {
    fn asset_paths(&self) -> AssetPaths {
        AssetPaths {
            regions_dir: self.regions_dir.clone(),
            buildings: self.buildings.clone(),
            sea_levels_dir: self.sea_levels_dir.clone(),
        }
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let assets = load_assets(&args.asset_paths()).context("loading input assets")?;
    let output = DamagePipeline::new(&assets)
        .run()
        .context("computing regional damages")?;

    let written = output.store(&args.output_dir);
    if written < 2 {
        warn!(written, "some artifacts could not be saved");
    }
    info!(output_dir = %args.output_dir.display(), written, "done");
    Ok(())
}
