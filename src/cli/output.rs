//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ConfigError(msg) => format!("Error: {}", msg),
        ApiError::CatalogError(msg) => format!("Error: could not read catalog: {}", msg),
        ApiError::StorageError(err) => {
            format!("Error: {} (progress up to this point was saved)", err)
        }
        other => format!("Error: {}", other),
    }
}
