//! Tile assembly: mosaic every warped chart, cut one pyramid, publish it.
//!
//! The pyramid is always rebuilt from scratch into the intermediate
//! directory and then swapped into the published location:
//!
//! ```text
//! <tiles_dir>/<category>          → <tiles_dir>/.<category>.old
//! <work>/05_intermediate_tiles    → <tiles_dir>/<category>
//! <tiles_dir>/.<category>.old     → deleted
//! ```
//!
//! Tiles from a previous run are never merged with new ones, so a chart
//! removed from the warped stage disappears from the published pyramid.
//! The intermediate directory must be on the same filesystem as the
//! published one for the renames to be atomic.
//!
//! With no warped charts an empty pyramid is published. When the toolkit
//! fails nothing is published and the previous pyramid stays in place.

use crate::layout::{Stage, StageLayout, remove_dir_if_exists, remove_if_exists};
use crate::toolkit::{GisToolkit, MosaicParams, Resampling, TileParams};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to walk tile directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Pyramid settings for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSettings {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub resampling: Resampling,
}

/// Result of one assembly attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileOutcome {
    /// A new pyramid replaced the published one. Zero charts publishes an
    /// empty directory.
    Published { charts: usize, tiles: usize },
    /// The toolkit failed; published tiles untouched.
    Failed(String),
}

/// Build and publish the tile pyramid for the category staged in `layout`.
pub fn assemble_tiles<T: GisToolkit>(
    toolkit: &T,
    layout: &StageLayout,
    publish_dir: &Path,
    settings: TileSettings,
) -> Result<TileOutcome, TileError> {
    let warped = layout.artifacts(Stage::Warped)?;

    let intermediate = layout.intermediate_tiles_dir();
    remove_dir_if_exists(&intermediate)?;
    fs::create_dir_all(&intermediate)?;

    if warped.is_empty() {
        info!("no warped charts, publishing an empty pyramid");
        swap_into_place(&intermediate, publish_dir)?;
        fs::create_dir_all(&intermediate)?;
        return Ok(TileOutcome::Published { charts: 0, tiles: 0 });
    }

    let mosaic = layout.mosaic_path();
    remove_if_exists(&mosaic)?;
    let inputs: Vec<PathBuf> = warped
        .iter()
        .map(|id| layout.artifact_path(Stage::Warped, id))
        .collect();

    info!(charts = inputs.len(), "building mosaic");
    if let Err(e) = toolkit.build_mosaic(&MosaicParams {
        inputs,
        output: mosaic.clone(),
    }) {
        warn!(error = %e, "mosaic failed, published tiles left untouched");
        return Ok(TileOutcome::Failed(e.to_string()));
    }

    let params = TileParams {
        mosaic,
        output_dir: intermediate.clone(),
        min_zoom: settings.min_zoom,
        max_zoom: settings.max_zoom,
        resampling: settings.resampling,
    };
    info!(zoom = %params.zoom_arg(), resampling = %params.resampling, "generating tiles");
    if let Err(e) = toolkit.generate_tiles(&params) {
        warn!(error = %e, "tiling failed, published tiles left untouched");
        return Ok(TileOutcome::Failed(e.to_string()));
    }

    swap_into_place(&intermediate, publish_dir)?;
    fs::create_dir_all(&intermediate)?;

    let tiles = count_tiles(publish_dir)?;
    info!(
        charts = warped.len(),
        tiles,
        dest = %publish_dir.display(),
        "tiles published"
    );
    Ok(TileOutcome::Published {
        charts: warped.len(),
        tiles,
    })
}

/// Replace `dest` with `fresh` by rename; the previous `dest` is deleted.
pub fn swap_into_place(fresh: &Path, dest: &Path) -> io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let old = parent.join(format!(".{name}.old"));

    // Leftover from a swap interrupted between the rename and the delete
    remove_dir_if_exists(&old)?;

    let had_previous = match fs::rename(dest, &old) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };

    if let Err(e) = fs::rename(fresh, dest) {
        if had_previous {
            // Put the old pyramid back so something is still published
            let _ = fs::rename(&old, dest);
        }
        return Err(e);
    }

    remove_dir_if_exists(&old)?;
    Ok(())
}

/// Number of tile images under `dir`. A missing directory has none.
pub fn count_tiles(dir: &Path) -> Result<usize, TileError> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() && is_tile(entry.path()) {
            count += 1;
        }
    }
    Ok(count)
}

fn is_tile(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "webp"))
}
