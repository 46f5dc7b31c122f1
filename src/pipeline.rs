//! Stage pipeline coordinator for one chart category.
//!
//! ```text
//! fetch → 01_raw → expand → 02_rgba → crop → 03_cropped → warp → 04_warped → tiles
//! ```
//!
//! Each stage is driven by a [`StageRunner`] over the committed artifacts of
//! the previous stage, so the coordinator itself holds no progress state:
//! everything it needs to resume is on disk. Stages run strictly one after
//! another; a per-chart failure in one stage just means that chart has no
//! input for the next.
//!
//! The toolkit and HTTP client are injected so tests can run the whole
//! pipeline against recording mocks.

use crate::catalog::CatalogScanner;
use crate::config::PipelineConfig;
use crate::fetch::{FetchError, FetchReport, HttpClient, fetch_charts};
use crate::geometry::CropPlan;
use crate::layout::{Stage, StageLayout};
use crate::ledger::Ledger;
use crate::stage::{StageError, StageReport, StageRunner, WorkItem};
use crate::tiles::{TileError, TileOutcome, TileSettings, assemble_tiles, count_tiles};
use crate::toolkit::{CropParams, ExpandParams, GisToolkit, WarpParams};
use crate::types::{Category, ChartId, ChartVersion};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error("tile assembly failed: {0}")]
    Tiles(#[from] TileError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything one [`Pipeline::run`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub category: Category,
    /// `None` when fetching was disabled for the run.
    pub fetch: Option<FetchReport>,
    pub expand: StageReport,
    pub crop: StageReport,
    pub warp: StageReport,
    pub tiles: TileOutcome,
}

impl RunReport {
    /// Whether any chart failed anywhere in the run.
    pub fn has_failures(&self) -> bool {
        self.fetch.as_ref().is_some_and(|f| !f.failed.is_empty())
            || !self.expand.is_clean()
            || !self.crop.is_clean()
            || !self.warp.is_clean()
            || matches!(self.tiles, TileOutcome::Failed(_))
    }
}

/// Read-only snapshot of a category's staging area and published tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStatus {
    pub category: Category,
    pub ledger: Vec<(ChartId, ChartVersion)>,
    pub stages: Vec<(Stage, usize)>,
    pub published_tiles: usize,
}

/// Inspect a category without touching anything on disk.
pub fn category_status(config: &PipelineConfig) -> Result<CategoryStatus, PipelineError> {
    let layout = StageLayout::new(&config.work_dir);
    let ledger = Ledger::load(layout.ledger_path());
    let mut stages = Vec::new();
    for stage in Stage::ALL {
        stages.push((stage, layout.artifacts(stage)?.len()));
    }
    Ok(CategoryStatus {
        category: config.options.category,
        ledger: ledger.iter().map(|(id, v)| (id.clone(), v)).collect(),
        stages,
        published_tiles: count_tiles(&config.publish_dir)?,
    })
}

pub struct Pipeline<T: GisToolkit, H: HttpClient> {
    config: PipelineConfig,
    layout: StageLayout,
    ledger: Ledger,
    toolkit: T,
    http: H,
}

impl<T: GisToolkit, H: HttpClient> Pipeline<T, H> {
    /// Prepare the staging area for the configured category and load its
    /// ledger.
    pub fn new(config: PipelineConfig, toolkit: T, http: H) -> Result<Self, PipelineError> {
        let layout = StageLayout::new(&config.work_dir);
        layout.create_directories()?;
        let ledger = Ledger::load(layout.ledger_path());
        Ok(Self {
            config,
            layout,
            ledger,
            toolkit,
            http,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &StageLayout {
        &self.layout
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Download every new or missing chart into the raw stage.
    pub fn fetch(&mut self) -> Result<FetchReport, PipelineError> {
        let scanner = CatalogScanner::new(&self.config.archive_host, self.config.options.category);
        let report = fetch_charts(
            &self.http,
            &scanner,
            &self.config.index_url,
            &mut self.ledger,
            &self.layout,
        )?;
        Ok(report)
    }

    /// Expand palette-indexed rasters to RGBA.
    pub fn expand_colors(&self) -> Result<StageReport, PipelineError> {
        let report = StageRunner::new(Stage::Raw, Stage::Colored).run(
            &self.layout,
            |id| vec![WorkItem::same_name(id)],
            |_, source, output| {
                self.toolkit.expand_colors(&ExpandParams {
                    source: source.to_path_buf(),
                    output: output.to_path_buf(),
                })
            },
        )?;
        Ok(report)
    }

    /// Cut legends and borders away, splitting charts that need it.
    pub fn crop(&self) -> Result<StageReport, PipelineError> {
        let cutline_dir = &self.config.cutline_dir;
        let report = StageRunner::new(Stage::Colored, Stage::Cropped).run(
            &self.layout,
            |id: &ChartId| -> Vec<WorkItem<PathBuf>> {
                CropPlan::for_chart(id)
                    .jobs
                    .into_iter()
                    .map(|job| WorkItem {
                        input: id.clone(),
                        output: job.output,
                        detail: cutline_dir.join(job.cutline),
                    })
                    .collect()
            },
            |item, source, output| {
                self.toolkit.crop(&CropParams {
                    source: source.to_path_buf(),
                    output: output.to_path_buf(),
                    cutline: item.detail.clone(),
                })
            },
        )?;
        Ok(report)
    }

    /// Reproject cropped charts into the web projection.
    pub fn warp(&self) -> Result<StageReport, PipelineError> {
        let report = StageRunner::new(Stage::Cropped, Stage::Warped).run(
            &self.layout,
            |id| vec![WorkItem::same_name(id)],
            |_, source, output| {
                self.toolkit.warp(&WarpParams {
                    source: source.to_path_buf(),
                    output: output.to_path_buf(),
                    target_srs: self.config.target_srs.clone(),
                    resampling: self.config.warp_resampling,
                    memory_mb: self.config.warp_memory_mb,
                })
            },
        )?;
        Ok(report)
    }

    /// Rebuild and publish the tile pyramid from every warped chart.
    pub fn assemble_tiles(&self) -> Result<TileOutcome, PipelineError> {
        let options = &self.config.options;
        let outcome = assemble_tiles(
            &self.toolkit,
            &self.layout,
            &self.config.publish_dir,
            TileSettings {
                min_zoom: options.min_zoom,
                max_zoom: options.max_zoom,
                resampling: options.resampling_kernel,
            },
        )?;
        Ok(outcome)
    }

    /// Run every stage in order.
    pub fn run(&mut self) -> Result<RunReport, PipelineError> {
        let category = self.config.options.category;
        info!(%category, "pipeline started");

        let fetch = if self.config.options.should_fetch {
            Some(self.fetch()?)
        } else {
            info!(%category, "fetch disabled, using staged charts only");
            None
        };
        let expand = self.expand_colors()?;
        let crop = self.crop()?;
        let warp = self.warp()?;
        let tiles = self.assemble_tiles()?;

        info!(%category, "pipeline finished");
        Ok(RunReport {
            category,
            fetch,
            expand,
            crop,
            warp,
            tiles,
        })
    }
}
