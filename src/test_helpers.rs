//! Shared test utilities for the chart-tiles test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = build_zip(&[("Seattle SEC.tif", b"raster".as_slice())]);
//! let (_tmp, layout) = staged_layout(&[(Stage::Raw, "Seattle")]);
//! assert_stage(&layout, Stage::Raw, &["Seattle"]);
//! ```

use std::io::{Cursor, Write};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use crate::layout::{Stage, StageLayout};
use crate::types::ChartId;

// =========================================================================
// Archives
// =========================================================================

/// Build an in-memory zip archive with the given `(name, contents)` members.
pub fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, contents) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

// =========================================================================
// Staging area
// =========================================================================

/// A fresh sectional staging area with the given artifacts committed.
pub fn staged_layout(artifacts: &[(Stage, &str)]) -> (TempDir, StageLayout) {
    let tmp = TempDir::new().unwrap();
    let layout = StageLayout::new(tmp.path().join("sectional"));
    layout.create_directories().unwrap();
    for (stage, id) in artifacts {
        std::fs::write(layout.artifact_path(*stage, &ChartId::new(*id)), b"artifact").unwrap();
    }
    (tmp, layout)
}

/// Assert the committed artifacts of a stage, in identifier order.
pub fn assert_stage(layout: &StageLayout, stage: Stage, expected: &[&str]) {
    let actual: Vec<String> = layout
        .artifacts(stage)
        .unwrap()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    assert_eq!(actual, expected, "artifacts of {:?}", stage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_zip_is_readable() {
        let bytes = build_zip(&[("a.txt", b"one".as_slice()), ("b.tif", b"two".as_slice())]);
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn staged_layout_commits_artifacts() {
        let (_tmp, layout) = staged_layout(&[(Stage::Raw, "Seattle"), (Stage::Warped, "Denver")]);
        assert_stage(&layout, Stage::Raw, &["Seattle"]);
        assert_stage(&layout, Stage::Warped, &["Denver"]);
        assert_stage(&layout, Stage::Cropped, &[]);
    }
}
