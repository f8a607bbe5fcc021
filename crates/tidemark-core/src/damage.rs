//! Per-(region, level) damage records and the aggregator producing them.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::{debug, warn};

use crate::building::CategoryTally;
use crate::error::{Error, GeometryError, Result};
use crate::geometry::{area_or_zero, clip_region, BaselineCache};
use crate::maybe_rayon::*;
use crate::region::Region;
use crate::scenario::{SeaLevel, SeaLevelSeries};

// ── Records ───────────────────────────────────────────────────────────────────

/// Flooded area beyond the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FloodedArea {
    /// Square metres. Negative when the baseline overlap exceeds the
    /// current overlap; never clamped.
    pub flooded: f64,
    /// Percent of the region's total area. Unbounded.
    pub coverage: f64,
}

/// Building attribution state for one damage entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum BuildingTally {
    /// Region tier does not receive building attribution; omitted on output.
    #[default]
    NotAttributed,
    /// Attributed, but no building lies inside the flood extent; `null`.
    Empty,
    Counts(CategoryTally),
}

impl BuildingTally {
    pub fn is_not_attributed(&self) -> bool {
        matches!(self, BuildingTally::NotAttributed)
    }
}

impl From<Option<CategoryTally>> for BuildingTally {
    fn from(tally: Option<CategoryTally>) -> Self {
        tally.map_or(BuildingTally::Empty, BuildingTally::Counts)
    }
}

impl Serialize for BuildingTally {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            BuildingTally::Counts(counts) => counts.serialize(s),
            BuildingTally::NotAttributed | BuildingTally::Empty => s.serialize_none(),
        }
    }
}

/// Damage for one region at one sea level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Damage {
    pub sea_level: SeaLevel,
    pub area: FloodedArea,
    #[serde(skip_serializing_if = "BuildingTally::is_not_attributed")]
    pub bldgs: BuildingTally,
}

/// A region together with its damages, ordered by sea level.
#[derive(Debug, Clone)]
pub struct EnhancedRegion<'a> {
    pub region: &'a Region,
    pub damages: Vec<Damage>,
}

impl<'a> EnhancedRegion<'a> {
    pub fn code(&self) -> &str {
        &self.region.code
    }
}

const CODE_KEY: &str = "code";
const TOTAL_AREA_KEY: &str = "totalArea";
const DAMAGES_KEY: &str = "damages";

struct OutputProperties<'r, 'a>(&'r EnhancedRegion<'a>);

impl Serialize for OutputProperties<'_, '_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let er = self.0;
        let mut map = s.serialize_map(None)?;
        for (key, value) in er.region.properties() {
            if key != CODE_KEY && key != TOTAL_AREA_KEY && key != DAMAGES_KEY {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry(CODE_KEY, &er.region.code)?;
        map.serialize_entry(TOTAL_AREA_KEY, &er.region.total_area)?;
        map.serialize_entry(DAMAGES_KEY, &er.damages)?;
        map.end()
    }
}

const FEATURE_KEYS: [&str; 5] = ["type", "bbox", "id", "geometry", "properties"];

/// Serialized as a GeoJSON Feature: the input feature, foreign members
/// included, with `code`, `totalArea` and `damages` added to its properties.
impl Serialize for EnhancedRegion<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let region = self.region;
        let mut map = s.serialize_map(None)?;
        map.serialize_entry("type", "Feature")?;
        if let Some(bbox) = &region.bbox {
            map.serialize_entry("bbox", bbox)?;
        }
        if let Some(id) = &region.id {
            map.serialize_entry("id", id)?;
        }
        map.serialize_entry("geometry", &region.geometry_json)?;
        map.serialize_entry("properties", &OutputProperties(self))?;
        for (key, value) in region.foreign_members.iter().flatten() {
            if !FEATURE_KEYS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Computes damage records for one run. Owns the baseline cache, so a fresh
/// aggregator starts with no memoized state.
pub struct DamageAggregator<'a> {
    scenarios: &'a SeaLevelSeries,
    baseline: BaselineCache,
}

impl<'a> DamageAggregator<'a> {
    pub fn new(scenarios: &'a SeaLevelSeries) -> Self {
        Self { scenarios, baseline: BaselineCache::new() }
    }

    pub fn baseline_cache(&self) -> &BaselineCache {
        &self.baseline
    }

    fn geometry_error(region: &Region, level: SeaLevel) -> impl FnOnce(GeometryError) -> Error + '_ {
        move |source| Error::Geometry { region: region.code.clone(), level, source }
    }

    /// Damage for `region` at `level`, or `None` when the incremental flooded
    /// area is zero. Such regions are left out of the level entirely.
    pub fn compute(&self, level: SeaLevel, region: &Region) -> Result<Option<Damage>> {
        let baseline_flood = &self.scenarios.baseline().flood;
        let baseline = self
            .baseline
            .get_or_compute(&region.code, || clip_region(baseline_flood, &region.geometry))
            .map_err(Self::geometry_error(region, SeaLevel::BASELINE))?;
        if level.is_baseline() {
            return Ok(None);
        }

        let flood = &self.scenarios.get(level).flood;
        let current = clip_region(flood, &region.geometry)
            .map_err(Self::geometry_error(region, level))?;

        let current_area = area_or_zero(current.as_ref());
        let baseline_area = area_or_zero(baseline.as_deref());
        let flooded = current_area - baseline_area;

        if flooded == 0.0 {
            return Ok(None);
        }
        if flooded < 0.0 {
            warn!(
                region = %region.code,
                level = level.index(),
                flooded,
                "negative incremental flooded area"
            );
        }

        let coverage = flooded * 100.0 / region.total_area;
        debug!(region = %region.code, level = level.index(), flooded, coverage, "region flooded");

        Ok(Some(Damage {
            sea_level: level,
            area: FloodedArea { flooded, coverage },
            bldgs: BuildingTally::NotAttributed,
        }))
    }

    /// Every region flooded beyond the baseline at `level`, in input order,
    /// each carrying a single damage entry. Regions are independent of one
    /// another and run in parallel under the `threading` feature.
    pub fn compute_level<'r>(
        &self,
        level: SeaLevel,
        regions: &'r [Region],
    ) -> Result<Vec<EnhancedRegion<'r>>> {
        let computed: Vec<Option<EnhancedRegion<'r>>> = regions
            .par_iter()
            .map(|region| -> Result<Option<EnhancedRegion<'r>>> {
                Ok(self.compute(level, region)?.map(|damage| EnhancedRegion {
                    region,
                    damages: vec![damage],
                }))
            })
            .collect::<Result<_>>()?;
        Ok(computed.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::square;
    use crate::region::tests::square_region;
    use crate::scenario::LEVEL_COUNT;
    use approx::assert_relative_eq;
    use geo::{polygon, MultiPolygon};
    use serde_json::json;

    /// Flood extents growing eastward from lon 0: level i covers
    /// lon [0, 1 + 0.1 * i] x lat [0, 1].
    fn growing_series() -> SeaLevelSeries {
        let extents = (0..LEVEL_COUNT)
            .map(|i| {
                let width = 1.0 + 0.1 * i as f64;
                let p = polygon![
                    (x: 0.0, y: 0.0),
                    (x: width, y: 0.0),
                    (x: width, y: 1.0),
                    (x: 0.0, y: 1.0),
                    (x: 0.0, y: 0.0),
                ];
                MultiPolygon::new(vec![p])
            })
            .collect();
        SeaLevelSeries::from_extents(extents).unwrap()
    }

    fn level(i: usize) -> SeaLevel {
        SeaLevel::new(i).unwrap()
    }

    #[test]
    fn baseline_level_has_no_incremental_area() {
        let series = growing_series();
        let agg = DamageAggregator::new(&series);
        let region = square_region("A", 0.5, 0.0, 1.0);
        assert!(agg.compute(SeaLevel::BASELINE, &region).unwrap().is_none());
    }

    #[test]
    fn incremental_area_subtracts_baseline() {
        let series = growing_series();
        let agg = DamageAggregator::new(&series);
        // Region lon [0.5, 1.5]; baseline covers [0.5, 1.0], level 5 covers [0.5, 1.5].
        let region = square_region("A", 0.5, 0.0, 1.0);
        let damage = agg.compute(level(5), &region).unwrap().expect("flooded");
        let expected = region.total_area * 0.5;
        assert_relative_eq!(damage.area.flooded, expected, max_relative = 1e-6);
        assert_relative_eq!(damage.area.coverage, 50.0, max_relative = 1e-6);
        assert_eq!(damage.sea_level, level(5));
        assert!(damage.bldgs.is_not_attributed());
    }

    #[test]
    fn region_never_reached_is_excluded_everywhere() {
        let series = growing_series();
        let agg = DamageAggregator::new(&series);
        let far = vec![square_region("FAR", 10.0, 10.0, 1.0)];
        for l in SeaLevel::all() {
            assert!(agg.compute_level(l, &far).unwrap().is_empty());
        }
    }

    #[test]
    fn baseline_is_computed_once_per_region() {
        let series = growing_series();
        let agg = DamageAggregator::new(&series);
        let regions = vec![square_region("A", 0.5, 0.0, 1.0), square_region("B", 1.5, 0.0, 1.0)];
        for l in SeaLevel::all() {
            agg.compute_level(l, &regions).unwrap();
        }
        assert_eq!(agg.baseline_cache().len(), 2);
    }

    #[test]
    fn result_independent_of_region_order() {
        let series = growing_series();
        let a = square_region("A", 0.5, 0.0, 1.0);
        let b = square_region("B", 1.5, 0.0, 1.0);

        let forward = DamageAggregator::new(&series);
        let fwd_regions = vec![a.clone(), b.clone()];
        let mut fwd = Vec::new();
        for l in SeaLevel::all() {
            fwd.push(forward.compute_level(l, &fwd_regions).unwrap());
        }

        let reverse = DamageAggregator::new(&series);
        let rev_regions = vec![b, a];
        for (i, l) in SeaLevel::all().enumerate() {
            let rev = reverse.compute_level(l, &rev_regions).unwrap();
            for er in &rev {
                let twin = fwd[i].iter().find(|f| f.code() == er.code()).unwrap();
                assert_eq!(twin.damages, er.damages);
            }
            assert_eq!(rev.len(), fwd[i].len());
        }
    }

    #[test]
    fn compute_level_preserves_input_order() {
        let series = growing_series();
        let agg = DamageAggregator::new(&series);
        let regions = vec![
            square_region("C", 1.0, 0.0, 0.5),
            square_region("FAR", 40.0, 0.0, 0.5),
            square_region("A", 1.2, 0.0, 0.5),
        ];
        let out = agg.compute_level(level(21), &regions).unwrap();
        let codes: Vec<&str> = out.iter().map(EnhancedRegion::code).collect();
        assert_eq!(codes, ["C", "A"]);
    }

    #[test]
    fn region_geometry_fault_names_region() {
        let series = growing_series();
        let agg = DamageAggregator::new(&series);
        let mut region = square_region("BAD", 0.0, 0.0, 1.0);
        region.geometry = MultiPolygon::new(vec![geo::Polygon::new(
            geo::LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
            vec![],
        )]);
        // The baseline clip runs first, so it is the level that reports.
        match agg.compute(level(3), &region) {
            Err(Error::Geometry { region, level: l, source }) => {
                assert_eq!(region, "BAD");
                assert_eq!(l, SeaLevel::BASELINE);
                assert!(matches!(source, GeometryError::DegenerateRing { .. }));
            }
            other => panic!("expected geometry error, got {other:?}"),
        }
        assert!(agg.baseline_cache().is_empty());
    }

    #[test]
    fn receding_extent_yields_negative_damage() {
        // Baseline floods the whole region; level 1 only its south-west
        // quarter; level 2 misses it entirely.
        let mut extents: Vec<MultiPolygon<f64>> =
            (0..LEVEL_COUNT).map(|_| square(0.0, 0.0, 1.0)).collect();
        extents[1] = square(0.0, 0.0, 0.5);
        extents[2] = square(5.0, 5.0, 1.0);
        let series = SeaLevelSeries::from_extents(extents).unwrap();
        let agg = DamageAggregator::new(&series);
        let region = square_region("A", 0.0, 0.0, 1.0);

        let shrunk = agg.compute(level(1), &region).unwrap().expect("still emitted");
        assert!(shrunk.area.flooded < 0.0);
        assert_relative_eq!(shrunk.area.coverage, -75.0, max_relative = 1e-3);

        let gone = agg.compute(level(2), &region).unwrap().expect("still emitted");
        assert_relative_eq!(gone.area.flooded, -region.total_area, max_relative = 1e-6);
        assert_relative_eq!(gone.area.coverage, -100.0, max_relative = 1e-6);

        let regions = vec![region.clone()];
        let listed = agg.compute_level(level(2), &regions).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].damages, vec![gone]);
    }

    #[test]
    fn serialization_keeps_bbox_and_foreign_members() {
        let mut region = square_region("A", 0.0, 0.0, 1.0);
        region.bbox = Some(vec![0.0, 0.0, 1.0, 1.0]);
        region.foreign_members = json!({ "source": "ancpi", "type": "Shadow" })
            .as_object()
            .cloned();
        let er = EnhancedRegion { region: &region, damages: Vec::new() };
        let v = serde_json::to_value(&er).unwrap();
        assert_eq!(v["bbox"], json!([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(v["source"], "ancpi");
        assert_eq!(v["type"], "Feature");

        let plain = square_region("B", 0.0, 0.0, 1.0);
        let v = serde_json::to_value(EnhancedRegion { region: &plain, damages: Vec::new() }).unwrap();
        assert!(v.get("bbox").is_none());
    }

    #[test]
    fn serializes_as_feature_with_damages() {
        let region = square_region("A", 0.0, 0.0, 1.0);
        let er = EnhancedRegion {
            region: &region,
            damages: vec![
                Damage {
                    sea_level: level(1),
                    area: FloodedArea { flooded: 10.0, coverage: 0.5 },
                    bldgs: BuildingTally::Empty,
                },
                Damage {
                    sea_level: level(2),
                    area: FloodedArea { flooded: 20.0, coverage: 1.0 },
                    bldgs: BuildingTally::NotAttributed,
                },
            ],
        };
        let v = serde_json::to_value(&er).unwrap();
        assert_eq!(v["type"], "Feature");
        assert_eq!(v["geometry"]["type"], "Polygon");
        assert_eq!(v["properties"]["code"], "A");
        assert_eq!(v["properties"]["name"], "A");
        assert!(v["properties"]["totalArea"].as_f64().unwrap() > 0.0);
        assert_eq!(
            v["properties"]["damages"],
            json!([
                { "seaLevel": 1, "area": { "flooded": 10.0, "coverage": 0.5 }, "bldgs": null },
                { "seaLevel": 2, "area": { "flooded": 20.0, "coverage": 1.0 } }
            ])
        );
    }
}
