//! Per-item progress lines and end-of-run summaries.

use crate::classify::ClassificationSummary;
use crate::key::WorkItem;
use crate::manifest::RunSummary;
use crate::pipeline::{ItemOutcome, RunObserver, RunPlan};
use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

/// Pre-run overview shown before asking for confirmation.
pub fn format_plan(plan: &RunPlan, cost_per_image: f64, request_delay: Duration) -> String {
    let mut out = String::new();
    out.push_str(&format!("Total items:     {}\n", plan.total()));
    out.push_str(&format!("Already done:    {}\n", plan.to_skip.len()));
    out.push_str(&format!("To generate:     {}\n", plan.remaining()));
    out.push_str(&format!(
        "Estimated cost:  ${:.2}\n",
        plan.estimated_cost(cost_per_image)
    ));
    out.push_str(&format!(
        "Estimated time:  ~{} minutes",
        plan.estimated_minutes(request_delay)
    ));
    out
}

pub fn format_run_summary(summary: &RunSummary, error_log: Option<&Path>) -> String {
    let by_mode = summary
        .methods
        .iter()
        .map(|(mode, count)| format!("{}: {}", mode, count))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!("Generated: {}", summary.generated);
    if !by_mode.is_empty() {
        out.push_str(&format!(" ({})", by_mode));
    }
    out.push_str(&format!("\nSkipped:   {}", summary.skipped));
    out.push_str(&format!("\nFailed:    {}", summary.failed));
    if summary.failed > 0 {
        if let Some(path) = error_log {
            out.push_str(&format!("\nSee {} for failure details", path.display()));
        }
    }
    out
}

pub fn format_classification_summary(summary: &ClassificationSummary, cache: &Path) -> String {
    format!(
        "Classified: {}\nCached:     {}\nDefaulted:  {}\nUnreadable: {}\nBatches:    {}\nCache:      {}",
        summary.classified,
        summary.cached,
        summary.defaulted,
        summary.unreadable,
        summary.batches,
        cache.display()
    )
}

/// Prints `[i/n] Category Item ... ok (ref)` for every processed item.
/// Skipped items print nothing.
pub struct ConsoleObserver<W: Write> {
    out: W,
    color: bool,
}

impl ConsoleObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        let out = std::io::stdout();
        let color = out.is_terminal();
        Self { out, color }
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RunObserver for ConsoleObserver<W> {
    fn on_item_start(&mut self, index: usize, total: usize, item: &WorkItem) {
        let _ = write!(self.out, "[{}/{}] {} ... ", index, total, item);
        let _ = self.out.flush();
    }

    fn on_item_finished(&mut self, _index: usize, _total: usize, _item: &WorkItem, outcome: &ItemOutcome) {
        let line = match (outcome, self.color) {
            (ItemOutcome::Skipped, _) => return,
            (ItemOutcome::Succeeded(mode), true) => format!("{} ({})", "ok".green(), mode),
            (ItemOutcome::Succeeded(mode), false) => format!("ok ({})", mode),
            (ItemOutcome::Failed(message), true) => format!("{} {}", "FAILED".red().bold(), message),
            (ItemOutcome::Failed(message), false) => format!("FAILED {}", message),
        };
        let _ = writeln!(self.out, "{}", line);
    }
}
