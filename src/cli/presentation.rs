//! CLI presentation: text and json formatters per command family.

mod run;
mod status;

pub use run::{format_classification_summary, format_plan, format_run_summary, ConsoleObserver};
pub use status::{format_status_json, format_status_text, StatusView};
