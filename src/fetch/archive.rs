//! Pulls the chart raster out of a publisher archive.
//!
//! Archives carry the GeoTIFF plus legends, metadata and readme files. Only
//! the first `.tif` member is extracted; it is written under the stage's
//! temp name and renamed to `<id>.tif` once complete, so a crash never
//! leaves a partial raw artifact behind.

use crate::layout::{ARTIFACT_EXTENSION, TEMP_PREFIX, remove_if_exists};
use crate::types::ChartId;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("unreadable archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive contains no .tif raster")]
    NoRaster,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Extract the raster of `id` from `bytes` into `dest_dir/<id>.tif`.
///
/// Returns the committed path.
pub fn extract_raster(bytes: &[u8], dest_dir: &Path, id: &ChartId) -> Result<PathBuf, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let member = (0..archive.len())
        .find(|&i| {
            archive
                .by_index(i)
                .map(|f| f.is_file() && is_raster_name(f.name()))
                .unwrap_or(false)
        })
        .ok_or(ArchiveError::NoRaster)?;

    let tmp = dest_dir.join(format!("{TEMP_PREFIX}{id}.{ARTIFACT_EXTENSION}"));
    let dest = dest_dir.join(format!("{id}.{ARTIFACT_EXTENSION}"));

    let result = (|| -> Result<(), ArchiveError> {
        let mut file = archive.by_index(member)?;
        debug!(chart = %id, member = file.name(), "extracting raster");
        let mut out = fs::File::create(&tmp)?;
        io::copy(&mut file, &mut out)?;
        out.sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        remove_if_exists(&tmp)?;
        return Err(e);
    }
    fs::rename(&tmp, &dest)?;
    Ok(dest)
}

fn is_raster_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
}
