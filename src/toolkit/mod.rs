//! External raster toolkit: the GDAL utilities, driven as subprocesses.
//!
//! | Operation | Program |
//! |---|---|
//! | **Expand colors** | `gdal_translate -expand rgba` |
//! | **Crop** | `gdalwarp -cutline … -crop_to_cutline` |
//! | **Warp** | `gdalwarp -t_srs …` |
//! | **Mosaic** | `gdalbuildvrt` |
//! | **Tiles** | `gdal2tiles.py --xyz` |
//!
//! The module is split into:
//! - **Parameters**: data structures describing each operation
//! - **Backend**: [`GisToolkit`] trait + [`GdalToolkit`]

pub mod backend;
pub mod gdal;
mod params;

pub use backend::{GisToolkit, ToolkitError};
pub use gdal::GdalToolkit;
pub use params::{CropParams, ExpandParams, MosaicParams, Resampling, TileParams, WarpParams};
