//! Toolkit backend trait and shared error type.
//!
//! The [`GisToolkit`] trait defines the five raster operations the pipeline
//! consumes. The production implementation is
//! [`GdalToolkit`](super::gdal::GdalToolkit), which shells out to the GDAL
//! command-line utilities. The pipeline only looks at success or failure.

use super::params::{CropParams, ExpandParams, MosaicParams, TileParams, WarpParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("{program} reported errors: {stderr}")]
    Stderr { program: String, stderr: String },
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("cutline not found: {0}")]
    MissingCutline(std::path::PathBuf),
}

/// External raster toolkit.
///
/// Every operation writes exactly the output path it is given and nothing
/// else; committing that output under its final name is the caller's job.
pub trait GisToolkit {
    /// Expand a paletted raster to RGBA.
    fn expand_colors(&self, params: &ExpandParams) -> Result<(), ToolkitError>;

    /// Crop a raster to a cutline polygon.
    fn crop(&self, params: &CropParams) -> Result<(), ToolkitError>;

    /// Reproject and resample a raster.
    fn warp(&self, params: &WarpParams) -> Result<(), ToolkitError>;

    /// Build a virtual mosaic over a set of rasters.
    fn build_mosaic(&self, params: &MosaicParams) -> Result<(), ToolkitError>;

    /// Generate a tile pyramid from a mosaic.
    fn generate_tiles(&self, params: &TileParams) -> Result<(), ToolkitError>;
}

impl<T: GisToolkit + ?Sized> GisToolkit for &T {
    fn expand_colors(&self, params: &ExpandParams) -> Result<(), ToolkitError> {
        (**self).expand_colors(params)
    }

    fn crop(&self, params: &CropParams) -> Result<(), ToolkitError> {
        (**self).crop(params)
    }

    fn warp(&self, params: &WarpParams) -> Result<(), ToolkitError> {
        (**self).warp(params)
    }

    fn build_mosaic(&self, params: &MosaicParams) -> Result<(), ToolkitError> {
        (**self).build_mosaic(params)
    }

    fn generate_tiles(&self, params: &TileParams) -> Result<(), ToolkitError> {
        (**self).generate_tiles(params)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    /// Mock toolkit that records operations and writes placeholder outputs.
    ///
    /// Outputs must exist on disk for the stage runner to commit them, so
    /// every successful operation writes a small file (or, for tiling, one
    /// tile) at the requested output path.
    #[derive(Default)]
    pub struct MockToolkit {
        pub operations: Mutex<Vec<RecordedOp>>,
        /// Source file stems whose operations should fail.
        pub failing: Mutex<HashSet<String>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Expand { source: String },
        Crop { source: String, cutline: String },
        Warp { source: String, target_srs: String, resampling: String },
        Mosaic { inputs: Vec<String> },
        Tiles { zoom: String, resampling: String },
    }

    impl MockToolkit {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make any operation whose source file is named `<id>.tif` fail.
        pub fn fail_source(&self, id: &str) {
            self.failing.lock().unwrap().insert(id.to_string());
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.operations.lock().unwrap().clear();
        }

        fn check(&self, source: &Path) -> Result<(), ToolkitError> {
            let stem = stem(source);
            if self.failing.lock().unwrap().contains(&stem) {
                return Err(ToolkitError::Failed {
                    program: "mock".into(),
                    status: "exit status: 1".into(),
                    stderr: format!("forced failure for {stem}"),
                });
            }
            Ok(())
        }
    }

    fn stem(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn name(path: &Path) -> String {
        path.file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    impl GisToolkit for MockToolkit {
        fn expand_colors(&self, params: &ExpandParams) -> Result<(), ToolkitError> {
            self.operations.lock().unwrap().push(RecordedOp::Expand {
                source: name(&params.source),
            });
            self.check(&params.source)?;
            std::fs::write(&params.output, b"rgba")?;
            Ok(())
        }

        fn crop(&self, params: &CropParams) -> Result<(), ToolkitError> {
            self.operations.lock().unwrap().push(RecordedOp::Crop {
                source: name(&params.source),
                cutline: name(&params.cutline),
            });
            self.check(&params.source)?;
            std::fs::write(&params.output, b"cropped")?;
            Ok(())
        }

        fn warp(&self, params: &WarpParams) -> Result<(), ToolkitError> {
            self.operations.lock().unwrap().push(RecordedOp::Warp {
                source: name(&params.source),
                target_srs: params.target_srs.clone(),
                resampling: params.resampling.to_string(),
            });
            self.check(&params.source)?;
            std::fs::write(&params.output, b"warped")?;
            Ok(())
        }

        fn build_mosaic(&self, params: &MosaicParams) -> Result<(), ToolkitError> {
            self.operations.lock().unwrap().push(RecordedOp::Mosaic {
                inputs: params.inputs.iter().map(|p| name(p)).collect(),
            });
            std::fs::write(&params.output, b"<VRTDataset/>")?;
            Ok(())
        }

        fn generate_tiles(&self, params: &TileParams) -> Result<(), ToolkitError> {
            self.operations.lock().unwrap().push(RecordedOp::Tiles {
                zoom: params.zoom_arg(),
                resampling: params.resampling.to_string(),
            });
            let tile_dir = params.output_dir.join("0").join("0");
            std::fs::create_dir_all(&tile_dir)?;
            std::fs::write(tile_dir.join("0.png"), b"png")?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toolkit = MockToolkit::new();
        let output = tmp.path().join("out.tif");

        toolkit
            .expand_colors(&ExpandParams {
                source: "/raw/Seattle.tif".into(),
                output: output.clone(),
            })
            .unwrap();

        assert!(output.exists());
        assert_eq!(
            toolkit.get_operations(),
            vec![RecordedOp::Expand {
                source: "Seattle.tif".into()
            }]
        );
    }

    #[test]
    fn mock_forced_failure_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toolkit = MockToolkit::new();
        toolkit.fail_source("Seattle");
        let output = tmp.path().join("out.tif");

        let result = toolkit.crop(&CropParams {
            source: "/rgba/Seattle.tif".into(),
            output: output.clone(),
            cutline: "/shapes/Seattle.shp".into(),
        });

        assert!(matches!(result, Err(ToolkitError::Failed { .. })));
        assert!(!output.exists());
        assert_eq!(toolkit.get_operations().len(), 1);
    }
}
