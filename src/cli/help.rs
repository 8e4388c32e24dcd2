//! CLI help and command-name contract for logging.

use crate::cli::parse::Commands;

/// Command name used as the `command` field on log events.
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Generate { .. } => "generate",
        Commands::Regenerate { .. } => "regenerate",
        Commands::Classify { .. } => "classify",
        Commands::Status { .. } => "status",
    }
}
