//! CLI output formatting for pipeline runs and status.
//!
//! Progress is logged through `tracing` while the run happens; this module
//! renders the end-of-run summary and the `status` view.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! sectional
//!     Fetch: 58 candidates, 2 queued, 1 fetched, 1 failed
//!         failed: Denver
//!     rgba: 1 committed, 37 skipped, 0 failed
//!     cropped: 1 committed, 38 skipped, 0 failed
//!     warped: 1 committed, 38 skipped, 0 failed
//!     Tiles: 39 charts → 48211 tiles
//! ```
//!
//! ## Status
//!
//! ```text
//! sectional
//!     Ledger: 38 charts
//!         Anchorage 04-22-2021
//!         Seattle 04-22-2021
//!     01_raw: 38
//!     02_rgba: 38
//!     03_cropped: 39
//!     04_warped: 39
//!     Published tiles: 48211
//! ```
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::fetch::FetchReport;
use crate::pipeline::{CategoryStatus, RunReport};
use crate::stage::StageReport;
use crate::tiles::TileOutcome;
use crate::types::ChartId;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn join_ids(ids: &[ChartId]) -> String {
    ids.iter()
        .map(ChartId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Run report
// ============================================================================

fn format_fetch(fetch: Option<&FetchReport>) -> Vec<String> {
    let Some(fetch) = fetch else {
        return vec![format!("{}Fetch: skipped", indent(1))];
    };
    if !fetch.catalog_available {
        return vec![format!("{}Fetch: catalog unavailable", indent(1))];
    }

    let mut lines = vec![format!(
        "{}Fetch: {} candidates, {} queued, {} fetched, {} failed",
        indent(1),
        fetch.candidates,
        fetch.queued,
        fetch.fetched.len(),
        fetch.failed.len()
    )];
    if !fetch.failed.is_empty() {
        lines.push(format!("{}failed: {}", indent(2), join_ids(&fetch.failed)));
    }
    lines
}

fn format_stage(label: &str, report: &StageReport) -> Vec<String> {
    let mut lines = vec![format!("{}{}: {}", indent(1), label, report)];
    if !report.failed.is_empty() {
        lines.push(format!("{}failed: {}", indent(2), join_ids(&report.failed)));
    }
    lines
}

fn format_tiles(outcome: &TileOutcome) -> String {
    match outcome {
        TileOutcome::Published { charts: 0, .. } => {
            format!("{}Tiles: no charts, published tiles cleared", indent(1))
        }
        TileOutcome::Published { charts, tiles } => {
            format!("{}Tiles: {} charts → {} tiles", indent(1), charts, tiles)
        }
        TileOutcome::Failed(reason) => {
            format!("{}Tiles: failed, previous tiles kept ({})", indent(1), reason)
        }
    }
}

pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let mut lines = vec![report.category.to_string()];
    lines.extend(format_fetch(report.fetch.as_ref()));
    lines.extend(format_stage("rgba", &report.expand));
    lines.extend(format_stage("cropped", &report.crop));
    lines.extend(format_stage("warped", &report.warp));
    lines.push(format_tiles(&report.tiles));
    lines
}

pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Status
// ============================================================================

pub fn format_status(status: &CategoryStatus) -> Vec<String> {
    let mut lines = vec![status.category.to_string()];

    lines.push(format!("{}Ledger: {} charts", indent(1), status.ledger.len()));
    for (id, version) in &status.ledger {
        lines.push(format!("{}{} {}", indent(2), id, version));
    }
    for (stage, count) in &status.stages {
        lines.push(format!("{}{}: {}", indent(1), stage.dir_name(), count));
    }
    lines.push(format!(
        "{}Published tiles: {}",
        indent(1),
        status.published_tiles
    ));
    lines
}

pub fn print_status(status: &CategoryStatus) {
    for line in format_status(status) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
