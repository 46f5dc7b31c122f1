//! # Chart Tiles
//!
//! An incremental, resumable pipeline that keeps a local mirror of the FAA
//! raster aeronautical charts current and turns it into a web tile pyramid.
//!
//! # Architecture: Staged Artifacts on Disk
//!
//! Every chart moves through a fixed sequence of stages. Each stage writes
//! one file per chart into its own directory, and the presence of that file
//! is the only record that the stage finished:
//!
//! ```text
//! 1. Fetch    catalog  →  01_raw/<id>.tif      (only new or missing versions)
//! 2. Expand   01_raw   →  02_rgba/<id>.tif     (palette → RGBA)
//! 3. Crop     02_rgba  →  03_cropped/<id>.tif  (cutline; some charts split in two)
//! 4. Warp     03_crop  →  04_warped/<id>.tif   (reproject)
//! 5. Tiles    04_warp  →  <tiles_dir>/<category>/{z}/{x}/{y}.png
//! ```
//!
//! Because progress lives in the filesystem, a run can be killed at any
//! point and the next run picks up exactly where it stopped. A version
//! ledger per category records what was last downloaded so unchanged charts
//! are never fetched twice, and a new version sweeps every stale derivative
//! before it is staged.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `ChartId`, `ChartVersion`, `Category` |
//! | [`ledger`] | Persistent `ChartId → ChartVersion` record |
//! | [`catalog`] | Archive link extraction from the publisher index |
//! | [`queue`] | Staleness test and deduplicated fetch queue |
//! | [`layout`] | Staging directories, artifact naming, invalidation sweep |
//! | [`fetch`] | Catalog → download → raw artifact → ledger |
//! | [`geometry`] | Crop plans, including the special-cased charts |
//! | [`stage`] | Idempotent per-chart stage runner |
//! | [`tiles`] | Mosaic, pyramid generation and atomic publish |
//! | [`pipeline`] | Runs the stages in order for one category |
//! | [`toolkit`] | GDAL subprocess backend behind the `GisToolkit` trait |
//! | [`config`] | `chart-tiles.toml` loading, merging and validation |
//! | [`output`] | CLI report formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Namespaced by Category
//!
//! Sectional and terminal-area charts share names (there is an `Anchorage`
//! of each), so every category gets its own staging directory, ledger and
//! published tile directory. A run over several categories is several
//! independent pipelines.
//!
//! ## GDAL as a Subprocess
//!
//! Raster work is delegated to the GDAL command-line utilities. The
//! [`toolkit::GisToolkit`] trait keeps the pipeline ignorant of how the
//! work is done, which is also what lets the tests substitute a recording
//! mock for the whole toolkit.

pub mod catalog;
pub mod config;
pub mod fetch;
pub mod geometry;
pub mod layout;
pub mod ledger;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod stage;
pub mod tiles;
pub mod toolkit;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
