//! On-disk staging layout for one chart category.
//!
//! ```text
//! <work_dir>/<category>/
//! ├── version_ledger.json        # Last fetched version per chart
//! ├── 01_raw/Seattle.tif         # Extracted from the publisher archive
//! ├── 02_rgba/Seattle.tif        # Palette expanded to RGBA
//! ├── 03_cropped/Seattle.tif     # Legend and border removed
//! ├── 04_warped/Seattle.tif      # Reprojected for the web
//! ├── 05_intermediate_tiles/     # Tiler output before it is published
//! └── merged_maps.vrt            # Mosaic over 04_warped/
//! ```
//!
//! A file named `<id>.tif` in a stage directory is the one and only signal
//! that the stage finished for that chart. Work in progress lives under the
//! hidden name `.tmp-<id>.tif` in the same directory and is renamed into
//! place only on success, so it is never mistaken for an artifact.

use crate::geometry;
use crate::types::ChartId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of every staged raster.
pub const ARTIFACT_EXTENSION: &str = "tif";

/// Prefix of in-progress files inside stage directories.
pub const TEMP_PREFIX: &str = ".tmp-";

const LEDGER_FILENAME: &str = "version_ledger.json";
const MOSAIC_FILENAME: &str = "merged_maps.vrt";
const INTERMEDIATE_TILES_DIR: &str = "05_intermediate_tiles";

/// One of the four per-chart staging steps, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Raw,
    Colored,
    Cropped,
    Warped,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Raw, Stage::Colored, Stage::Cropped, Stage::Warped];

    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Raw => "01_raw",
            Stage::Colored => "02_rgba",
            Stage::Cropped => "03_cropped",
            Stage::Warped => "04_warped",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Colored => "rgba",
            Stage::Cropped => "cropped",
            Stage::Warped => "warped",
        }
    }

    /// Whether artifacts in this stage are named after crop-plan outputs
    /// rather than the published chart name.
    fn uses_derived_ids(self) -> bool {
        matches!(self, Stage::Cropped | Stage::Warped)
    }
}

/// Paths of the staging area for one category.
#[derive(Debug, Clone)]
pub struct StageLayout {
    root: PathBuf,
}

impl StageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_FILENAME)
    }

    pub fn mosaic_path(&self) -> PathBuf {
        self.root.join(MOSAIC_FILENAME)
    }

    pub fn intermediate_tiles_dir(&self) -> PathBuf {
        self.root.join(INTERMEDIATE_TILES_DIR)
    }

    /// Create every staging directory that does not exist yet.
    pub fn create_directories(&self) -> io::Result<()> {
        for stage in Stage::ALL {
            fs::create_dir_all(self.stage_dir(stage))?;
        }
        fs::create_dir_all(self.intermediate_tiles_dir())
    }

    /// Final, committed location of a chart's artifact.
    pub fn artifact_path(&self, stage: Stage, id: &ChartId) -> PathBuf {
        self.stage_dir(stage)
            .join(format!("{}.{}", id, ARTIFACT_EXTENSION))
    }

    /// Location a stage writes to before committing.
    pub fn temp_path(&self, stage: Stage, id: &ChartId) -> PathBuf {
        self.stage_dir(stage)
            .join(format!("{}{}.{}", TEMP_PREFIX, id, ARTIFACT_EXTENSION))
    }

    pub fn has_artifact(&self, stage: Stage, id: &ChartId) -> bool {
        self.artifact_path(stage, id).is_file()
    }

    /// Committed artifacts of a stage, sorted by identifier.
    ///
    /// A missing stage directory has no artifacts.
    pub fn artifacts(&self, stage: Stage) -> io::Result<Vec<ChartId>> {
        let dir = self.stage_dir(stage);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(id) = artifact_id(&entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove every staged artifact of `id` so a fresh fetch cannot be
    /// combined with derivatives of the previous version.
    ///
    /// Split charts are swept under their derived names at the crop and
    /// warp stages. Returns the paths that were actually removed.
    pub fn invalidate(&self, id: &ChartId) -> io::Result<Vec<PathBuf>> {
        let derived = geometry::derived_ids(id);
        let mut removed = Vec::new();

        for stage in Stage::ALL {
            let mut names = vec![id.clone()];
            if stage.uses_derived_ids() {
                names.extend(derived.iter().filter(|d| *d != id).cloned());
            }
            for name in names {
                for path in [self.artifact_path(stage, &name), self.temp_path(stage, &name)] {
                    if remove_if_exists(&path)? {
                        debug!(path = %path.display(), "invalidated artifact");
                        removed.push(path);
                    }
                }
            }
        }
        Ok(removed)
    }

    /// Remove in-progress files left behind by an interrupted run.
    pub fn clear_temp_files(&self, stage: Stage) -> io::Result<usize> {
        let entries = match fs::read_dir(self.stage_dir(stage)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut cleared = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX)
                && remove_if_exists(&entry.path())?
            {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Operator full reset: drop every staged artifact for the category.
    ///
    /// The ledger is kept; with the raw artifacts gone every chart is
    /// queued again on the next fetch regardless of its recorded version.
    pub fn reset(&self) -> io::Result<()> {
        for stage in Stage::ALL {
            remove_dir_if_exists(&self.stage_dir(stage))?;
        }
        remove_dir_if_exists(&self.intermediate_tiles_dir())?;
        remove_if_exists(&self.mosaic_path())?;
        Ok(())
    }
}

/// Identifier of a committed artifact path, or `None` for temp files and
/// anything that is not a staged raster.
pub fn artifact_id(path: &Path) -> Option<ChartId> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with(TEMP_PREFIX) || name.starts_with('.') {
        return None;
    }
    let stem = name.strip_suffix(&format!(".{ARTIFACT_EXTENSION}"))?;
    if stem.is_empty() {
        return None;
    }
    Some(ChartId::new(stem))
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was removed. Any error other than not-found
/// propagates.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Recursively remove a directory, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
