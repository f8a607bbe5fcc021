//! Pipeline orchestrator: runs all damage stages in order for one run.

use std::path::Path;

use tracing::{debug, info};

use crate::assets::Assets;
use crate::building::{assign_to_region, buildings_within, tally_by_category, Building};
use crate::damage::{Damage, DamageAggregator, EnhancedRegion};
use crate::error::Result;
use crate::maybe_rayon::*;
use crate::merge::merge_levels;
use crate::persist::{store_logged, ENHANCED_COUNTIES_FILE, ENHANCED_UATS_FILE};
use crate::region::Region;
use crate::scenario::{SeaLevel, SeaLevelSeries, LEVEL_COUNT};

// ── Output ────────────────────────────────────────────────────────────────────

/// Enriched region collections produced by one run.
#[derive(Debug, Clone)]
pub struct PipelineOutput<'a> {
    pub uats: Vec<EnhancedRegion<'a>>,
    pub counties: Vec<EnhancedRegion<'a>>,
}

impl PipelineOutput<'_> {
    /// Write both collections into `output_dir`. Each write is independent;
    /// a failed one is logged and the other still goes ahead. Returns the
    /// number of artifacts written.
    pub fn store(&self, output_dir: &Path) -> usize {
        [
            store_logged(&self.uats, output_dir, ENHANCED_UATS_FILE),
            store_logged(&self.counties, output_dir, ENHANCED_COUNTIES_FILE),
        ]
        .into_iter()
        .filter(|written| *written)
        .count()
    }
}

// ── Building attribution ──────────────────────────────────────────────────────

/// Attach per-level building tallies to a region's damages.
///
/// Buildings are first assigned to the region by its full outline. For each
/// damage entry they are then filtered by that level's complete flood
/// extent, not the baseline-subtracted part, so counts are cumulative while
/// the area figure is incremental.
pub fn attribute_buildings<'a>(
    er: &EnhancedRegion<'a>,
    buildings: &[Building],
    scenarios: &SeaLevelSeries,
) -> EnhancedRegion<'a> {
    let assigned = assign_to_region(er.region, buildings);

    let damages = er
        .damages
        .iter()
        .map(|damage| {
            let flood = &scenarios.get(damage.sea_level).flood;
            let flooded = buildings_within(flood, assigned.iter().copied());
            Damage { bldgs: tally_by_category(flooded).into(), ..damage.clone() }
        })
        .collect();

    debug!(
        region = %er.region.label(),
        assigned = assigned.len(),
        tally = ?tally_by_category(assigned.iter().copied()),
        "assigned buildings"
    );

    EnhancedRegion { region: er.region, damages }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

/// The damage pipeline over one set of loaded assets.
pub struct DamagePipeline<'a> {
    assets: &'a Assets,
}

impl<'a> DamagePipeline<'a> {
    pub fn new(assets: &'a Assets) -> Self {
        Self { assets }
    }

    /// Per-level damage lists for one region collection, in ascending level
    /// order. Each collection gets its own baseline cache so codes from
    /// different tiers never share an entry.
    fn levels_for(&self, regions: &'a [Region], kind: &str) -> Result<Vec<Vec<EnhancedRegion<'a>>>> {
        let aggregator = DamageAggregator::new(&self.assets.sea_levels);
        let mut levels = Vec::with_capacity(LEVEL_COUNT);
        for level in SeaLevel::all() {
            let flooded = aggregator.compute_level(level, regions)?;
            info!(
                level = level.index(),
                elevation_m = level.elevation_m(),
                regions = flooded.len(),
                "processed {kind} sea level"
            );
            levels.push(flooded);
        }
        Ok(levels)
    }

    /// Run every stage.
    ///
    /// Pipeline order:
    ///   1. Per-level incremental damage for counties and UATs
    ///   2. Merge of per-level lists into one record per region
    ///   3. Building attribution for UATs
    ///
    /// Stops at the first geometry fault.
    pub fn run(&self) -> Result<PipelineOutput<'a>> {
        let assets = self.assets;
        info!(
            uats = assets.uats.len(),
            counties = assets.counties.len(),
            buildings = assets.buildings.len(),
            sea_levels = assets.sea_levels.len(),
            "filtering flooded regions"
        );

        // ── 1. Per-level damage ─────────────────────────────────────────────
        let county_levels = self.levels_for(&assets.counties, "county")?;
        let uat_levels = self.levels_for(&assets.uats, "UAT")?;

        // ── 2. Merge ────────────────────────────────────────────────────────
        let counties = merge_levels(county_levels);
        let uats = merge_levels(uat_levels);
        info!(uats = uats.len(), counties = counties.len(), "reduced enhanced regions");

        // ── 3. Building attribution ─────────────────────────────────────────
        let uats: Vec<EnhancedRegion<'a>> = uats
            .par_iter()
            .map(|er| attribute_buildings(er, &assets.buildings, &assets.sea_levels))
            .collect();
        info!(uats = uats.len(), "assigned buildings to regions");

        Ok(PipelineOutput { uats, counties })
    }
}
