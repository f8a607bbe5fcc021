//! Asset loader: region collections, building inventory, sea-level extents.
//!
//! Every document is read and validated up front. Any failure aborts the
//! run before computation starts.

use std::fs;
use std::path::{Path, PathBuf};

use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::building::Building;
use crate::error::{AssetLoadError, SeriesError};
use crate::geometry::to_multipolygon;
use crate::maybe_rayon;
use crate::region::{AdminLevel, Region};
use crate::scenario::{SeaLevel, SeaLevelSeries};

pub const UATS_FILE: &str = "uats.json";
pub const COUNTIES_FILE: &str = "counties.json";

// ── Locations ─────────────────────────────────────────────────────────────────

/// Where the input documents live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    /// Directory holding `uats.json` and `counties.json`.
    pub regions_dir: PathBuf,
    /// Building inventory document.
    pub buildings: PathBuf,
    /// Directory holding one `{elevation}.json` per sea level.
    pub sea_levels_dir: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            regions_dir: PathBuf::from("data/regions"),
            buildings: PathBuf::from("generated/floodedBuildings.json"),
            sea_levels_dir: PathBuf::from("public/data"),
        }
    }
}

impl AssetPaths {
    pub fn uats(&self) -> PathBuf {
        self.regions_dir.join(UATS_FILE)
    }

    pub fn counties(&self) -> PathBuf {
        self.regions_dir.join(COUNTIES_FILE)
    }

    pub fn sea_level(&self, level: SeaLevel) -> PathBuf {
        self.sea_levels_dir.join(format!("{}.json", level.file_stem()))
    }
}

// ── Loaded data ───────────────────────────────────────────────────────────────

/// All inputs of one run. Immutable after loading.
#[derive(Debug, Clone)]
pub struct Assets {
    pub uats: Vec<Region>,
    pub counties: Vec<Region>,
    pub buildings: Vec<Building>,
    pub sea_levels: SeaLevelSeries,
}

/// Region documents are plain arrays of features; a FeatureCollection is
/// accepted as well.
#[derive(Deserialize)]
#[serde(untagged)]
enum RegionDocument {
    Features(Vec<Feature>),
    Collection(FeatureCollection),
}

impl RegionDocument {
    fn into_features(self) -> Vec<Feature> {
        match self {
            RegionDocument::Features(features) => features,
            RegionDocument::Collection(fc) => fc.features,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AssetLoadError> {
    let text = fs::read_to_string(path).map_err(|source| AssetLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AssetLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(path: &Path, reason: impl Into<String>) -> AssetLoadError {
    AssetLoadError::Invalid { path: path.to_path_buf(), reason: reason.into() }
}

// ── Loaders ───────────────────────────────────────────────────────────────────

/// Load one region collection.
pub fn load_regions(path: &Path, admin_level: AdminLevel) -> Result<Vec<Region>, AssetLoadError> {
    let doc: RegionDocument = read_json(path)?;
    let regions = doc
        .into_features()
        .into_iter()
        .enumerate()
        .map(|(i, feature)| {
            Region::from_feature(feature, admin_level)
                .map_err(|reason| invalid(path, format!("feature {i}: {reason}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(path = %path.display(), count = regions.len(), kind = %admin_level, "loaded regions");
    Ok(regions)
}

/// Load the building inventory.
pub fn load_buildings(path: &Path) -> Result<Vec<Building>, AssetLoadError> {
    let buildings: Vec<Building> = read_json(path)?;
    let located = buildings.iter().filter(|b| b.location().is_some()).count();
    info!(path = %path.display(), count = buildings.len(), located, "loaded buildings");
    if located < buildings.len() {
        warn!(skipped = buildings.len() - located, "buildings without a usable location are ignored");
    }
    Ok(buildings)
}

/// Flood extent of one sea-level document: the geometry of its first feature.
pub fn load_flood_extent(path: &Path) -> Result<MultiPolygon<f64>, AssetLoadError> {
    let fc: FeatureCollection = read_json(path)?;
    let geometry = fc
        .features
        .into_iter()
        .next()
        .ok_or_else(|| invalid(path, "feature collection is empty"))?
        .geometry
        .ok_or_else(|| invalid(path, "first feature has no geometry"))?;
    geo::Geometry::<f64>::try_from(geometry.value)
        .ok()
        .and_then(to_multipolygon)
        .ok_or_else(|| invalid(path, "flood extent is not a Polygon or MultiPolygon"))
}

/// Load all sea-level extents, baseline first.
pub fn load_sea_levels(paths: &AssetPaths) -> Result<SeaLevelSeries, AssetLoadError> {
    let extents = SeaLevel::all()
        .map(|level| load_flood_extent(&paths.sea_level(level)))
        .collect::<Result<Vec<_>, _>>()?;
    let series = SeaLevelSeries::from_extents(extents).map_err(|e| match e {
        SeriesError::Extent { level, source } => invalid(&paths.sea_level(level), source.to_string()),
        count @ SeriesError::Count { .. } => invalid(&paths.sea_levels_dir, count.to_string()),
    })?;
    info!(dir = %paths.sea_levels_dir.display(), count = series.len(), "loaded sea levels");
    Ok(series)
}

/// Load every input. Region collections, the inventory, and the sea-level
/// series have no ordering dependency and load in parallel under the
/// `threading` feature.
pub fn load_assets(paths: &AssetPaths) -> Result<Assets, AssetLoadError> {
    let (regions, (buildings, sea_levels)) = maybe_rayon::join(
        || {
            maybe_rayon::join(
                || load_regions(&paths.uats(), AdminLevel::Uat),
                || load_regions(&paths.counties(), AdminLevel::County),
            )
        },
        || maybe_rayon::join(|| load_buildings(&paths.buildings), || load_sea_levels(paths)),
    );
    let (uats, counties) = regions;
    Ok(Assets {
        uats: uats?,
        counties: counties?,
        buildings: buildings?,
        sea_levels: sea_levels?,
    })
}
