//! CLI domain: parse, route, help, output, and presentation only.
//! Orchestration lives in the pipeline and classification runners.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::map_error;
pub use parse::{Cli, Commands, ReferenceMode, StatusFormat};
pub use presentation::{
    format_classification_summary, format_plan, format_run_summary, format_status_json,
    format_status_text, ConsoleObserver, StatusView,
};
pub use route::{confirmation_accepted, RunContext};
