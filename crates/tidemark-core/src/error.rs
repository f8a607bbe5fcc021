//! Error types for the damage pipeline.
//!
//! Asset and geometry failures are fatal for a run. Persistence failures are
//! reported per artifact and never abort the remaining writes.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::scenario::SeaLevel;

/// Input document could not be read, parsed, or interpreted.
#[derive(Debug, Error)]
pub enum AssetLoadError {
    #[error("cannot read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid JSON for its asset kind", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Which side of a clipping operation a defect was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Flood,
    Region,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Flood => f.write_str("flood extent"),
            Operand::Region => f.write_str("region"),
        }
    }
}

/// Malformed polygon input, or a fault raised inside the clipper.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("{operand} polygon {polygon} ring {ring} has {len} coordinates, need at least 4")]
    DegenerateRing {
        operand: Operand,
        polygon: usize,
        ring: usize,
        len: usize,
    },

    #[error("{operand} polygon {polygon} ring {ring} has a non-finite coordinate")]
    NonFinite {
        operand: Operand,
        polygon: usize,
        ring: usize,
    },

    #[error("polygon clipping aborted: {0}")]
    ClipFault(String),
}

/// Flood extents that cannot form a sea-level series.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("expected {expected} sea-level extents, found {found}")]
    Count { expected: usize, found: usize },

    #[error("flood extent for sea level {level} is malformed")]
    Extent {
        level: SeaLevel,
        #[source]
        source: GeometryError,
    },
}

/// An output artifact could not be written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("cannot serialize {filename}")]
    Serialize {
        filename: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fatal pipeline error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    AssetLoad(#[from] AssetLoadError),

    #[error("geometry fault for region {region} at sea level {level}")]
    Geometry {
        region: String,
        level: SeaLevel,
        #[source]
        source: GeometryError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
