//! Workspace config file source: <workspace>/assetforge.toml

use super::super::ConfigLoader;
use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::Path;
use tracing::debug;

/// Add the workspace file to the builder when present.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = workspace_root.join(ConfigLoader::WORKSPACE_FILE);
    if !path.exists() {
        debug!(config_path = %path.display(), "No workspace config file, using defaults");
        return Ok(builder);
    }
    Ok(builder.add_source(File::from(path).required(false)))
}
