//! Building inventory: location filtering, category classification, tallies.

use std::collections::{BTreeMap, HashMap};

use geo::MultiPolygon;
use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::{contains_point, envelope, envelope_contains};
use crate::region::Region;

// ── Serde helpers ─────────────────────────────────────────────────────────────

fn null_as_empty_tags<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<HashMap<String, String>, D::Error> {
    let tags: Option<HashMap<String, String>> = Option::deserialize(d)?;
    Ok(tags.unwrap_or_default())
}

// ── Building ──────────────────────────────────────────────────────────────────

/// One inventory entry: a point plus OSM-style tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Building {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty_tags")]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub leisure: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub shop: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

impl Building {
    /// Non-empty tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        non_empty(self.tags.get(key))
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tag(key).is_some()
    }

    /// (lon, lat) when both are present, finite and non-zero. Zero is the
    /// inventory's placeholder for an unknown position.
    pub fn location(&self) -> Option<(f64, f64)> {
        let usable = |v: f64| v.is_finite() && v != 0.0;
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) if usable(lon) && usable(lat) => Some((lon, lat)),
            _ => None,
        }
    }
}

// ── Classification ────────────────────────────────────────────────────────────

pub const RESIDENTIAL: &str = "residential";
pub const SHOP: &str = "shop";
pub const LEISURE: &str = "leisure";
pub const BUSINESS: &str = "business";
pub const OTHER: &str = "other";

/// A rule yields a category label when it applies to the building.
pub type Rule = fn(&Building) -> Option<&str>;

/// Named entry in the classification chain.
#[derive(Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    pub apply: Rule,
}

fn has_address(b: &Building) -> Option<&str> {
    (b.has_tag("addr:housenumber") || b.has_tag("addr:postcode")).then_some(RESIDENTIAL)
}

/// Any `building` value other than `yes`, including an empty one.
fn building_type(b: &Building) -> Option<&str> {
    b.tags.get("building").map(String::as_str).filter(|v| *v != "yes")
}

fn designation(b: &Building) -> Option<&str> {
    b.tag("designation")
}

fn amenity(b: &Building) -> Option<&str> {
    b.tag("amenity")
}

fn shop(b: &Building) -> Option<&str> {
    b.has_tag("shop").then_some(SHOP)
}

fn leisure(b: &Building) -> Option<&str> {
    non_empty(b.leisure.as_ref()).map(|_| LEISURE)
}

fn business(b: &Building) -> Option<&str> {
    non_empty(b.name.as_ref()).map(|_| BUSINESS)
}

fn fallback(_: &Building) -> Option<&str> {
    Some(OTHER)
}

/// Classification chain in priority order; the first rule that yields a
/// label wins. An address always means residential, even over an explicit
/// `building=*` type.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule { name: "address", apply: has_address },
    ClassificationRule { name: "building", apply: building_type },
    ClassificationRule { name: "designation", apply: designation },
    ClassificationRule { name: "amenity", apply: amenity },
    ClassificationRule { name: "shop", apply: shop },
    ClassificationRule { name: "leisure", apply: leisure },
    ClassificationRule { name: "name", apply: business },
    ClassificationRule { name: "fallback", apply: fallback },
];

/// Category label for a building.
pub fn classify(building: &Building) -> &str {
    CLASSIFICATION_RULES
        .iter()
        .find_map(|rule| (rule.apply)(building))
        .unwrap_or(OTHER)
}

/// Count of buildings per category label, sorted by label.
pub type CategoryTally = BTreeMap<String, usize>;

/// Tally buildings by category. Returns `None` for an empty input so "no
/// buildings" stays distinct from any set of counts.
pub fn tally_by_category<'b, I>(buildings: I) -> Option<CategoryTally>
where
    I: IntoIterator<Item = &'b Building>,
{
    let mut tally = CategoryTally::new();
    for building in buildings {
        *tally.entry(classify(building).to_string()).or_insert(0) += 1;
    }
    (!tally.is_empty()).then_some(tally)
}

// ── Assignment ────────────────────────────────────────────────────────────────

/// Buildings whose location falls inside `area` (boundary included).
/// Buildings without a usable location are skipped.
pub fn buildings_within<'b, I>(area: &MultiPolygon<f64>, buildings: I) -> Vec<&'b Building>
where
    I: IntoIterator<Item = &'b Building>,
{
    let Some(env) = envelope(area) else {
        return Vec::new();
    };
    buildings
        .into_iter()
        .filter(|b| match b.location() {
            Some((lon, lat)) => envelope_contains(&env, lon, lat) && contains_point(area, lon, lat),
            None => false,
        })
        .collect()
}

/// Buildings inside the region's full outline.
pub fn assign_to_region<'b>(region: &Region, buildings: &'b [Building]) -> Vec<&'b Building> {
    buildings_within(&region.geometry, buildings)
}
