use std::fmt;

use geo::MultiPolygon;
use geojson::{feature::Id, Bbox, Feature, JsonObject, JsonValue};

use crate::geometry::{geodesic_area, to_multipolygon};

/// Property holding the national (SIRUTA) code of a UAT.
pub const PRIMARY_CODE_KEY: &str = "natcode";
/// Property holding the county code, used when `natcode` is absent.
pub const SECONDARY_CODE_KEY: &str = "countyCode";
const NAME_KEY: &str = "name";

/// Tier of the administrative hierarchy a region came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminLevel {
    /// Lowest tier: commune, town or city.
    Uat,
    County,
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminLevel::Uat => f.write_str("UAT"),
            AdminLevel::County => f.write_str("county"),
        }
    }
}

/// One administrative region, loaded once and never mutated.
///
/// `properties` keeps every input property verbatim (names, population by
/// census year, mnemonics) so the output can carry them through. A `bbox`
/// and any foreign members of the feature are kept the same way.
#[derive(Debug, Clone)]
pub struct Region {
    pub code: String,
    pub name: Option<String>,
    pub admin_level: AdminLevel,
    /// Geodesic area of the full region outline in m².
    pub total_area: f64,
    pub geometry: MultiPolygon<f64>,
    pub(crate) id: Option<JsonValue>,
    pub(crate) geometry_json: geojson::Geometry,
    pub(crate) properties: JsonObject,
    pub(crate) bbox: Option<Bbox>,
    pub(crate) foreign_members: Option<JsonObject>,
}

/// Non-empty string or number identifier; anything else is absent.
fn identifier(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Region code: the primary identifier, else the secondary one.
pub fn resolve_code(properties: &JsonObject) -> Option<String> {
    identifier(properties.get(PRIMARY_CODE_KEY))
        .or_else(|| identifier(properties.get(SECONDARY_CODE_KEY)))
}

impl Region {
    /// Interpret a GeoJSON feature as a region. The error string describes
    /// what is missing; the caller attaches the source path.
    pub fn from_feature(feature: Feature, admin_level: AdminLevel) -> Result<Self, String> {
        let properties = feature.properties.unwrap_or_default();
        let code = resolve_code(&properties).ok_or_else(|| {
            format!("feature has neither `{PRIMARY_CODE_KEY}` nor `{SECONDARY_CODE_KEY}`")
        })?;
        let geometry_json = feature
            .geometry
            .ok_or_else(|| format!("region {code} has no geometry"))?;
        let geometry = geo::Geometry::<f64>::try_from(geometry_json.value.clone())
            .ok()
            .and_then(to_multipolygon)
            .ok_or_else(|| format!("region {code} geometry is not a Polygon or MultiPolygon"))?;

        let name = properties
            .get(NAME_KEY)
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let id = feature.id.map(|id| match id {
            Id::String(s) => JsonValue::String(s),
            Id::Number(n) => JsonValue::Number(n),
        });

        Ok(Self {
            total_area: geodesic_area(&geometry),
            code,
            name,
            admin_level,
            geometry,
            id,
            geometry_json,
            properties,
            bbox: feature.bbox,
            foreign_members: feature.foreign_members,
        })
    }

    /// Name for log lines, falling back to the code.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code)
    }

    /// Input properties as loaded.
    pub fn properties(&self) -> &JsonObject {
        &self.properties
    }
}
