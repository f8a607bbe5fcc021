//! Sea-level damage estimation.
//!
//! For every administrative region and each of the 22 sea-level scenarios,
//! computes the flooded area beyond the −0.3 m baseline, its share of the
//! region, and (for UATs) the affected buildings by category.

pub mod assets;
pub mod building;
pub mod damage;
pub mod error;
pub mod geometry;
mod maybe_rayon;
pub mod merge;
pub mod persist;
pub mod pipeline;
pub mod region;
pub mod scenario;

pub use assets::{load_assets, AssetPaths, Assets};
pub use damage::{BuildingTally, Damage, DamageAggregator, EnhancedRegion, FloodedArea};
pub use error::{AssetLoadError, Error, GeometryError, PersistenceError, Result, SeriesError};
pub use pipeline::{DamagePipeline, PipelineOutput};
pub use region::{AdminLevel, Region};
pub use scenario::{SeaLevel, SeaLevelScenario, SeaLevelSeries, LEVEL_COUNT};
