//! Idempotent, resumable execution of one per-chart stage.
//!
//! Every per-chart stage (color expansion, crop, warp) has the same shape:
//!
//! ```text
//! for each committed artifact in the input stage:
//!     for each work item the chart plans:
//!         skip if the output artifact is already committed
//!         transform input → <output_dir>/.tmp-<id>.tif
//!         rename temp → <output_dir>/<id>.tif          (commit)
//! ```
//!
//! Because the commit is a rename within one directory, an interrupted run
//! leaves at worst a hidden temp file, which is cleared at the start of the
//! next run. Re-running a finished stage does nothing.
//!
//! A failing transform is logged and counted; the loop continues with the
//! next item and the failed item is retried on the next run. Only
//! filesystem errors in the staging area abort the stage.

use crate::layout::{Stage, StageLayout, remove_if_exists};
use crate::toolkit::ToolkitError;
use crate::types::ChartId;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StageError {
    #[error("{stage} stage: IO error: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: io::Error,
    },
}

/// One unit of work: produce `output` from the input artifact of `input`.
///
/// `detail` carries whatever the transform needs beyond the two ids (the
/// cutline for crops).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<T = ()> {
    pub input: ChartId,
    pub output: ChartId,
    pub detail: T,
}

impl WorkItem<()> {
    /// The common case: output named after the input, nothing extra.
    pub fn same_name(id: &ChartId) -> Self {
        Self {
            input: id.clone(),
            output: id.clone(),
            detail: (),
        }
    }
}

/// What one stage run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub committed: Vec<ChartId>,
    pub skipped: usize,
    pub failed: Vec<ChartId>,
}

impl StageReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} committed, {} skipped, {} failed",
            self.committed.len(),
            self.skipped,
            self.failed.len()
        )
    }
}

/// Runs one stage from `input` artifacts to `output` artifacts.
#[derive(Debug, Clone, Copy)]
pub struct StageRunner {
    pub input: Stage,
    pub output: Stage,
}

impl StageRunner {
    pub fn new(input: Stage, output: Stage) -> Self {
        Self { input, output }
    }

    /// Run with the default skip test: the output artifact is committed.
    pub fn run<T, P, F>(
        &self,
        layout: &StageLayout,
        plan: P,
        transform: F,
    ) -> Result<StageReport, StageError>
    where
        P: FnMut(&ChartId) -> Vec<WorkItem<T>>,
        F: FnMut(&WorkItem<T>, &Path, &Path) -> Result<(), ToolkitError>,
    {
        let output = self.output;
        self.run_with_skip(
            layout,
            plan,
            |item: &WorkItem<T>| layout.has_artifact(output, &item.output),
            transform,
        )
    }

    /// Run with a caller-supplied skip test.
    ///
    /// `transform(item, input_path, temp_path)` must write `temp_path`; the
    /// runner commits it.
    pub fn run_with_skip<T, P, S, F>(
        &self,
        layout: &StageLayout,
        mut plan: P,
        mut skip: S,
        mut transform: F,
    ) -> Result<StageReport, StageError>
    where
        P: FnMut(&ChartId) -> Vec<WorkItem<T>>,
        S: FnMut(&WorkItem<T>) -> bool,
        F: FnMut(&WorkItem<T>, &Path, &Path) -> Result<(), ToolkitError>,
    {
        let stage = self.output.label();
        let io_err = |source: io::Error| StageError::Io { stage, source };

        fs::create_dir_all(layout.stage_dir(self.output)).map_err(io_err)?;
        let cleared = layout.clear_temp_files(self.output).map_err(io_err)?;
        if cleared > 0 {
            info!(stage, cleared, "removed leftovers of an interrupted run");
        }

        let mut report = StageReport::default();
        for id in layout.artifacts(self.input).map_err(io_err)? {
            let source = layout.artifact_path(self.input, &id);
            for item in plan(&id) {
                if skip(&item) {
                    debug!(stage, chart = %item.output, "already committed, skipping");
                    report.skipped += 1;
                    continue;
                }

                let temp = layout.temp_path(self.output, &item.output);
                let result = transform(&item, &source, &temp).and_then(|()| {
                    if temp.is_file() {
                        Ok(())
                    } else {
                        Err(ToolkitError::Io(io::Error::new(
                            io::ErrorKind::NotFound,
                            "toolkit reported success but wrote no output",
                        )))
                    }
                });

                match result {
                    Ok(()) => {
                        fs::rename(&temp, layout.artifact_path(self.output, &item.output))
                            .map_err(io_err)?;
                        info!(stage, chart = %item.output, "committed");
                        report.committed.push(item.output);
                    }
                    Err(e) => {
                        remove_if_exists(&temp).map_err(io_err)?;
                        warn!(stage, chart = %item.output, error = %e, "transform failed");
                        report.failed.push(item.output);
                    }
                }
            }
        }

        info!(stage, %report, "stage finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{assert_stage, staged_layout};
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn setup(raw: &[&str]) -> (TempDir, StageLayout) {
        let artifacts: Vec<(Stage, &str)> = raw.iter().map(|id| (Stage::Raw, *id)).collect();
        staged_layout(&artifacts)
    }

    fn copy(_: &WorkItem, src: &Path, dst: &Path) -> Result<(), ToolkitError> {
        fs::copy(src, dst)?;
        Ok(())
    }

    fn runner() -> StageRunner {
        StageRunner::new(Stage::Raw, Stage::Colored)
    }

    #[test]
    fn commits_every_input() {
        let (_tmp, layout) = setup(&["A", "B"]);
        let report = runner().run(&layout, |id| vec![WorkItem::same_name(id)], copy).unwrap();

        assert_eq!(report.committed, vec![ChartId::new("A"), ChartId::new("B")]);
        assert_stage(&layout, Stage::Colored, &["A", "B"]);
    }

    #[test]
    fn second_run_does_nothing() {
        let (_tmp, layout) = setup(&["A", "B"]);
        runner().run(&layout, |id| vec![WorkItem::same_name(id)], copy).unwrap();

        let calls = RefCell::new(0);
        let report = runner()
            .run(&layout, |id| vec![WorkItem::same_name(id)], |item, src, dst| {
                *calls.borrow_mut() += 1;
                copy(item, src, dst)
            })
            .unwrap();

        assert_eq!(*calls.borrow(), 0);
        assert_eq!(report.skipped, 2);
        assert!(report.committed.is_empty());
    }

    #[test]
    fn failure_leaves_no_artifact_and_continues() {
        let (_tmp, layout) = setup(&["A", "B"]);
        let report = runner()
            .run(&layout, |id| vec![WorkItem::same_name(id)], |item, src, dst| {
                if item.input.as_str() == "A" {
                    fs::write(dst, b"partial")?;
                    return Err(ToolkitError::Timeout {
                        program: "gdal_translate".into(),
                        secs: 1,
                    });
                }
                copy(item, src, dst)
            })
            .unwrap();

        assert_eq!(report.failed, vec![ChartId::new("A")]);
        assert_eq!(report.committed, vec![ChartId::new("B")]);
        assert!(!layout.has_artifact(Stage::Colored, &"A".into()));
        assert!(!layout.temp_path(Stage::Colored, &"A".into()).exists());
    }

    #[test]
    fn success_without_output_is_failure() {
        let (_tmp, layout) = setup(&["A"]);
        let report = runner()
            .run(&layout, |id| vec![WorkItem::same_name(id)], |_, _, _| Ok(()))
            .unwrap();
        assert_eq!(report.failed, vec![ChartId::new("A")]);
        assert!(layout.artifacts(Stage::Colored).unwrap().is_empty());
    }

    #[test]
    fn stale_temp_is_cleared_and_work_redone() {
        let (_tmp, layout) = setup(&["A"]);
        let stale = layout.temp_path(Stage::Colored, &"A".into());
        fs::write(&stale, b"interrupted").unwrap();

        let report = runner().run(&layout, |id| vec![WorkItem::same_name(id)], copy).unwrap();

        assert_eq!(report.committed, vec![ChartId::new("A")]);
        assert_eq!(
            fs::read(layout.artifact_path(Stage::Colored, &"A".into())).unwrap(),
            b"artifact"
        );
        assert!(!stale.exists());
    }

    #[test]
    fn one_input_may_plan_several_outputs() {
        let (_tmp, layout) = setup(&["Split"]);
        let plan = |id: &ChartId| -> Vec<WorkItem> {
            ["East", "West"]
                .iter()
                .map(|half| WorkItem {
                    input: id.clone(),
                    output: id.with_suffix(half),
                    detail: (),
                })
                .collect()
        };
        // West already done by an earlier, interrupted run
        fs::write(
            layout.artifact_path(Stage::Colored, &"Split_West".into()),
            b"done",
        )
        .unwrap();

        let report = runner().run(&layout, plan, copy).unwrap();

        assert_eq!(report.committed, vec![ChartId::new("Split_East")]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn custom_skip_test() {
        let (_tmp, layout) = setup(&["A", "B"]);
        let report = runner()
            .run_with_skip(
                &layout,
                |id| vec![WorkItem::same_name(id)],
                |item| item.input.as_str() == "B",
                copy,
            )
            .unwrap();
        assert_eq!(report.committed, vec![ChartId::new("A")]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn report_display() {
        let report = StageReport {
            committed: vec!["A".into(), "B".into()],
            skipped: 3,
            failed: vec!["C".into()],
        };
        assert_eq!(report.to_string(), "2 committed, 3 skipped, 1 failed");
        assert!(!report.is_clean());
    }
}
