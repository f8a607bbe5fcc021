use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};

use crate::error::PersistenceError;

pub const ENHANCED_UATS_FILE: &str = "enhancedUATs.json";
pub const ENHANCED_COUNTIES_FILE: &str = "enhancedCounties.json";

/// Serialize `data` as JSON to `output_dir/filename`, replacing any previous
/// artifact. The directory is created if missing. Not atomic.
pub fn store<T: Serialize + ?Sized>(
    data: &T,
    output_dir: &Path,
    filename: &str,
) -> Result<PathBuf, PersistenceError> {
    let json = serde_json::to_string(data).map_err(|source| PersistenceError::Serialize {
        filename: filename.to_string(),
        source,
    })?;
    let path = output_dir.join(filename);
    fs::create_dir_all(output_dir)
        .and_then(|()| fs::write(&path, json))
        .map_err(|source| PersistenceError::Write { path: path.clone(), source })?;
    Ok(path)
}

/// [`store`], logging the outcome. A failure is logged and swallowed so the
/// remaining artifacts still get written; returns whether the write succeeded.
pub fn store_logged<T: Serialize + ?Sized>(data: &T, output_dir: &Path, filename: &str) -> bool {
    match store(data, output_dir, filename) {
        Ok(path) => {
            info!(path = %path.display(), "saved");
            true
        }
        Err(e) => {
            let cause = std::error::Error::source(&e)
                .map(ToString::to_string)
                .unwrap_or_default();
            error!(error = %e, %cause, "could not save {filename}");
            false
        }
    }
}
