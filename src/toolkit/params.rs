//! Parameter types for toolkit operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the stage coordinator (which decides what to run) and
//! the [`backend`](super::backend) (which does the raster work). This
//! separation allows swapping the GDAL subprocess backend for a recording
//! mock in tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Resampling kernel names as understood by GDAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    Near,
    Bilinear,
    Cubic,
    Cubicspline,
    Lanczos,
    Average,
    Mode,
    /// Tiler-only kernel (PIL antialias); gdalwarp does not offer it.
    Antialias,
}

impl Resampling {
    pub fn as_str(self) -> &'static str {
        match self {
            Resampling::Near => "near",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
            Resampling::Cubicspline => "cubicspline",
            Resampling::Lanczos => "lanczos",
            Resampling::Average => "average",
            Resampling::Mode => "mode",
            Resampling::Antialias => "antialias",
        }
    }

    pub fn supported_by_warp(self) -> bool {
        !matches!(self, Resampling::Antialias)
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expand a paletted raster to RGBA, no reprojection.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandParams {
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Crop a raster to a cutline polygon, discarding legend and border.
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub cutline: PathBuf,
}

/// Reproject a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub target_srs: String,
    pub resampling: Resampling,
    pub memory_mb: u32,
}

/// Combine rasters into one virtual mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicParams {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Cut a mosaic into an XYZ tile pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct TileParams {
    pub mosaic: PathBuf,
    pub output_dir: PathBuf,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub resampling: Resampling,
}

impl TileParams {
    /// Zoom range argument in tiler syntax, e.g. `0-11`.
    pub fn zoom_arg(&self) -> String {
        format!("{}-{}", self.min_zoom, self.max_zoom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resampling_serde_names() {
        let r: Resampling = serde_json::from_str("\"cubicspline\"").unwrap();
        assert_eq!(r, Resampling::Cubicspline);
        assert_eq!(serde_json::to_string(&Resampling::Lanczos).unwrap(), "\"lanczos\"");
    }

    #[test]
    fn antialias_is_tiler_only() {
        assert!(!Resampling::Antialias.supported_by_warp());
        assert!(Resampling::Lanczos.supported_by_warp());
    }

    #[test]
    fn zoom_arg_format() {
        let p = TileParams {
            mosaic: "m.vrt".into(),
            output_dir: "out".into(),
            min_zoom: 0,
            max_zoom: 6,
            resampling: Resampling::Antialias,
        };
        assert_eq!(p.zoom_arg(), "0-6");
    }
}
