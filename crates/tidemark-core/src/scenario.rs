use std::fmt;

use geo::MultiPolygon;
use serde::Serialize;

use crate::error::{Operand, SeriesError};
use crate::geometry::validate;

// ── Level grid ────────────────────────────────────────────────────────────────

/// Number of modeled sea-level scenarios.
pub const LEVEL_COUNT: usize = 22;
/// Baseline elevation in tenths of a metre (−0.3 m).
const BASELINE_TENTHS: i32 = -3;

/// Index of a sea-level scenario, 0 (baseline, −0.3 m) to 21 (+1.8 m) in
/// 0.1 m steps. Serialized as the bare index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SeaLevel(usize);

impl SeaLevel {
    pub const BASELINE: SeaLevel = SeaLevel(0);

    pub fn new(index: usize) -> Option<Self> {
        (index < LEVEL_COUNT).then_some(Self(index))
    }

    /// All levels in ascending order.
    pub fn all() -> impl Iterator<Item = SeaLevel> {
        (0..LEVEL_COUNT).map(SeaLevel)
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_baseline(self) -> bool {
        self.0 == 0
    }

    fn tenths(self) -> i32 {
        self.0 as i32 + BASELINE_TENTHS
    }

    /// Elevation above present sea level in metres.
    pub fn elevation_m(self) -> f64 {
        f64::from(self.tenths()) / 10.0
    }

    /// Dataset name for this level: the elevation to one decimal place,
    /// e.g. `-0.3`, `0.0`, `1.8`.
    pub fn file_stem(self) -> String {
        format!("{:.1}", self.elevation_m())
    }
}

impl fmt::Display for SeaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+.1} m)", self.0, self.elevation_m())
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

/// Flood extent for one sea level.
#[derive(Debug, Clone)]
pub struct SeaLevelScenario {
    pub level: SeaLevel,
    pub flood: MultiPolygon<f64>,
}

/// The full, contiguous set of scenarios. Index `i` holds level `i`.
#[derive(Debug, Clone)]
pub struct SeaLevelSeries {
    scenarios: Vec<SeaLevelScenario>,
}

impl SeaLevelSeries {
    /// Build a series from flood extents ordered by level, starting at the
    /// baseline. Exactly [`LEVEL_COUNT`] extents are required, and each one
    /// is validated here so clipping never rechecks it.
    pub fn from_extents(extents: Vec<MultiPolygon<f64>>) -> Result<Self, SeriesError> {
        if extents.len() != LEVEL_COUNT {
            return Err(SeriesError::Count { expected: LEVEL_COUNT, found: extents.len() });
        }
        let scenarios = SeaLevel::all()
            .zip(extents)
            .map(|(level, flood)| {
                validate(&flood, Operand::Flood)
                    .map_err(|source| SeriesError::Extent { level, source })?;
                Ok(SeaLevelScenario { level, flood })
            })
            .collect::<Result<_, SeriesError>>()?;
        Ok(Self { scenarios })
    }

    pub fn baseline(&self) -> &SeaLevelScenario {
        &self.scenarios[0]
    }

    pub fn get(&self, level: SeaLevel) -> &SeaLevelScenario {
        &self.scenarios[level.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeaLevelScenario> {
        self.scenarios.iter()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stems_cover_full_range() {
        let stems: Vec<String> = SeaLevel::all().map(SeaLevel::file_stem).collect();
        assert_eq!(stems.len(), LEVEL_COUNT);
        assert_eq!(stems[0], "-0.3");
        assert_eq!(stems[2], "-0.1");
        assert_eq!(stems[3], "0.0");
        assert_eq!(stems[4], "0.1");
        assert_eq!(stems[21], "1.8");
    }

    #[test]
    fn levels_are_contiguous_and_bounded() {
        assert!(SeaLevel::new(LEVEL_COUNT).is_none());
        for (i, level) in SeaLevel::all().enumerate() {
            assert_eq!(level.index(), i);
        }
        assert!(SeaLevel::BASELINE.is_baseline());
        assert!(!SeaLevel::new(1).unwrap().is_baseline());
    }

    #[test]
    fn series_requires_every_level() {
        let extents = vec![MultiPolygon::new(vec![]); LEVEL_COUNT - 1];
        assert!(matches!(
            SeaLevelSeries::from_extents(extents),
            Err(SeriesError::Count { expected: LEVEL_COUNT, found: 21 })
        ));

        let extents = vec![MultiPolygon::new(vec![]); LEVEL_COUNT];
        let series = SeaLevelSeries::from_extents(extents).unwrap();
        assert_eq!(series.len(), LEVEL_COUNT);
        assert_eq!(series.baseline().level, SeaLevel::BASELINE);
        let top = SeaLevel::new(21).unwrap();
        assert_eq!(series.get(top).level, top);
    }

    #[test]
    fn malformed_extent_is_rejected_with_its_level() {
        let mut extents = vec![MultiPolygon::new(vec![]); LEVEL_COUNT];
        extents[4] = MultiPolygon::new(vec![geo::Polygon::new(
            geo::LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
            vec![],
        )]);
        match SeaLevelSeries::from_extents(extents) {
            Err(SeriesError::Extent { level, .. }) => assert_eq!(level.index(), 4),
            other => panic!("expected extent error, got {other:?}"),
        }
    }

    #[test]
    fn serializes_as_bare_index() {
        let json = serde_json::to_string(&SeaLevel::new(7).unwrap()).unwrap();
        assert_eq!(json, "7");
    }
}
