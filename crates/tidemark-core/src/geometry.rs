//! Polygon intersection engine.
//!
//! Exact boolean-AND clipping of flood extents against region outlines,
//! geodesic area, point containment, and the per-run baseline cache.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use geo::{
    BooleanOps, BoundingRect, ChamberlainDuquetteArea, Coord, Geometry, Intersects, LineString,
    MultiPolygon, Point, Rect,
};

use crate::error::{GeometryError, Operand};

// ── Conversion ────────────────────────────────────────────────────────────────

/// Lift a Polygon or MultiPolygon into a MultiPolygon. Any other geometry
/// kind yields `None`.
pub fn to_multipolygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        _ => None,
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

fn check_ring(
    ring: &LineString<f64>,
    operand: Operand,
    polygon: usize,
    index: usize,
) -> Result<(), GeometryError> {
    let len = ring.0.len();
    if len < 4 || ring.0.first() != ring.0.last() {
        return Err(GeometryError::DegenerateRing { operand, polygon, ring: index, len });
    }
    if ring.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(GeometryError::NonFinite { operand, polygon, ring: index });
    }
    Ok(())
}

/// Reject rings the clipper cannot handle: fewer than four coordinates,
/// unclosed, or carrying NaN/infinite ordinates. Ring 0 is the exterior.
pub fn validate(mp: &MultiPolygon<f64>, operand: Operand) -> Result<(), GeometryError> {
    for (p, polygon) in mp.0.iter().enumerate() {
        check_ring(polygon.exterior(), operand, p, 0)?;
        for (i, interior) in polygon.interiors().iter().enumerate() {
            check_ring(interior, operand, p, i + 1)?;
        }
    }
    Ok(())
}

// ── Clipping ──────────────────────────────────────────────────────────────────

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Intersect a flood extent with a region outline.
///
/// Returns `Ok(None)` when the two do not overlap. A disjoint bounding box
/// short-circuits before the sweep runs. Faults inside the clipper are
/// returned as [`GeometryError::ClipFault`] rather than unwinding.
pub fn intersect(
    flood: &MultiPolygon<f64>,
    region: &MultiPolygon<f64>,
) -> Result<Option<MultiPolygon<f64>>, GeometryError> {
    validate(flood, Operand::Flood)?;
    clip_region(flood, region)
}

/// [`intersect`] for a flood extent that has already been validated, as
/// every extent in a [`SeaLevelSeries`](crate::scenario::SeaLevelSeries) is.
/// Only the region is checked.
pub fn clip_region(
    flood: &MultiPolygon<f64>,
    region: &MultiPolygon<f64>,
) -> Result<Option<MultiPolygon<f64>>, GeometryError> {
    validate(region, Operand::Region)?;

    match (flood.bounding_rect(), region.bounding_rect()) {
        (Some(a), Some(b)) if a.intersects(&b) => {}
        _ => return Ok(None),
    }

    let clipped = panic::catch_unwind(AssertUnwindSafe(|| flood.intersection(region)))
        .map_err(|payload| GeometryError::ClipFault(panic_message(payload.as_ref())))?;

    if clipped.0.is_empty() {
        Ok(None)
    } else {
        Ok(Some(clipped))
    }
}

// ── Measurement ───────────────────────────────────────────────────────────────

/// Area in square metres of a lon/lat MultiPolygon on the WGS84 equatorial
/// sphere (Chamberlain–Duquette). Interior rings are subtracted.
pub fn geodesic_area(mp: &MultiPolygon<f64>) -> f64 {
    mp.chamberlain_duquette_unsigned_area()
}

/// Area of an optional intersection; absence counts as zero.
pub fn area_or_zero(mp: Option<&MultiPolygon<f64>>) -> f64 {
    mp.map(geodesic_area).unwrap_or(0.0)
}

/// Boundary-inclusive point-in-polygon test at (lon, lat).
pub fn contains_point(mp: &MultiPolygon<f64>, lon: f64, lat: f64) -> bool {
    mp.intersects(&Point::new(lon, lat))
}

/// Bounding box of a MultiPolygon, used to prefilter point tests.
pub fn envelope(mp: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    mp.bounding_rect()
}

/// Cheap pretest against an envelope before the exact ring test.
pub fn envelope_contains(rect: &Rect<f64>, lon: f64, lat: f64) -> bool {
    rect.intersects(&Coord { x: lon, y: lat })
}

// ── Baseline cache ────────────────────────────────────────────────────────────

/// Baseline (level 0) intersection per region, keyed by region code.
///
/// Owned by a single pipeline run. Each key is written once and read for
/// every later level; `None` records a region the baseline never touches.
#[derive(Debug, Default)]
pub struct BaselineCache {
    entries: RwLock<HashMap<String, Option<Arc<MultiPolygon<f64>>>>>,
}

impl BaselineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached baseline intersection for `code`, computing and
    /// storing it on first use. A failed computation is not cached.
    pub fn get_or_compute<F>(
        &self,
        code: &str,
        compute: F,
    ) -> Result<Option<Arc<MultiPolygon<f64>>>, GeometryError>
    where
        F: FnOnce() -> Result<Option<MultiPolygon<f64>>, GeometryError>,
    {
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
        {
            return Ok(hit.clone());
        }

        let computed = compute()?.map(Arc::new);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // First writer wins.
        let stored = entries.entry(code.to_string()).or_insert(computed);
        Ok(stored.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
