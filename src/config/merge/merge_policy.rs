//! Defaults for every on-disk location, applied before any file source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("pipeline.catalog", "data/vehicles.json")?
        .set_default("pipeline.output_dir", "CarImages")?
        .set_default("pipeline.progress_file", "CarImages/manifest.json")?
        .set_default("pipeline.error_log", "CarImages/errors.log")?
        .set_default("pipeline.direction_cache", "CarImages/direction_cache.json")
}
