//! Tool configuration.
//!
//! Handles loading, validating, and merging the `chart-tiles.toml` file.
//! Stock defaults reproduce the behaviour of a plain run; a user file only
//! needs the keys it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! work_dir = "tmp"                          # Staging area, one subdirectory per category
//! tiles_dir = "tiles"                       # Published tiles, one subdirectory per category
//! clipping_shapes_dir = "assets/clipping_shapes"
//!
//! [catalog]
//! index_url = "https://www.faa.gov/air_traffic/flight_info/aeronav/digital_products/vfr/"
//! archive_host = "aeronav.faa.gov/visual"
//! timeout_secs = 300
//!
//! [tiles]
//! min_zoom = 0
//! max_zoom = 11
//! resampling = "antialias"
//!
//! [warp]
//! target_srs = "EPSG:3857"
//! resampling = "lanczos"
//! memory_mb = 1024
//!
//! [categories.planning]
//! max_zoom = 6                              # Per-category overrides
//!
//! [toolkit]
//! gdal_translate = "gdal_translate"
//! gdalwarp = "gdalwarp"
//! gdalbuildvrt = "gdalbuildvrt"
//! gdal2tiles = "gdal2tiles.py"
//! fail_on_stderr = false
//! # timeout_secs = 3600
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::toolkit::Resampling;
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Highest zoom level accepted by `validate`.
pub const MAX_SUPPORTED_ZOOM: u8 = 24;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration loaded from `chart-tiles.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Root of the staging area. Each category stages under `<work_dir>/<category>/`.
    pub work_dir: PathBuf,
    /// Root of the published tiles. Each category publishes to `<tiles_dir>/<category>/`.
    pub tiles_dir: PathBuf,
    /// Root of the cutline shapefiles, laid out as `<dir>/<category>/<name>.shp`.
    pub clipping_shapes_dir: PathBuf,
    pub catalog: CatalogConfig,
    pub tiles: TilesConfig,
    pub warp: WarpConfig,
    pub categories: CategoriesConfig,
    pub toolkit: ToolkitConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("tmp"),
            tiles_dir: PathBuf::from("tiles"),
            clipping_shapes_dir: PathBuf::from("assets/clipping_shapes"),
            catalog: CatalogConfig::default(),
            tiles: TilesConfig::default(),
            warp: WarpConfig::default(),
            categories: CategoriesConfig::default(),
            toolkit: ToolkitConfig::default(),
        }
    }
}

/// Remote publisher endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Index page listing the current chart archives.
    pub index_url: String,
    /// Host and path prefix in front of the `<MM-DD-YYYY>/` segment of archive URLs.
    pub archive_host: String,
    /// HTTP timeout for the index page and each archive.
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            index_url: "https://www.faa.gov/air_traffic/flight_info/aeronav/digital_products/vfr/"
                .to_string(),
            archive_host: "aeronav.faa.gov/visual".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Tile pyramid defaults shared by all categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilesConfig {
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Resampling kernel used by the tiler when building overview levels.
    pub resampling: Resampling,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 11,
            resampling: Resampling::Antialias,
        }
    }
}

/// Reprojection settings shared by all categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarpConfig {
    pub target_srs: String,
    pub resampling: Resampling,
    /// Working memory handed to the warper, also used as its block cache size.
    pub memory_mb: u32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            target_srs: "EPSG:3857".to_string(),
            resampling: Resampling::Lanczos,
            memory_mb: 1024,
        }
    }
}

/// Optional per-category overrides of the tile and warp defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_srs: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoriesConfig {
    pub sectional: CategoryOverrides,
    pub tac: CategoryOverrides,
    pub planning: CategoryOverrides,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            sectional: CategoryOverrides::default(),
            tac: CategoryOverrides::default(),
            // The single wall chart covers the whole country; deeper levels
            // add nothing but disk usage.
            planning: CategoryOverrides {
                max_zoom: Some(6),
                ..Default::default()
            },
        }
    }
}

impl CategoriesConfig {
    pub fn get(&self, category: Category) -> &CategoryOverrides {
        match category {
            Category::Sectional => &self.sectional,
            Category::Tac => &self.tac,
            Category::Planning => &self.planning,
        }
    }
}

/// External GIS toolkit invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    pub gdal_translate: String,
    pub gdalwarp: String,
    pub gdalbuildvrt: String,
    pub gdal2tiles: String,
    /// Kill a toolkit invocation that runs longer than this. Absent = wait forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Treat any stderr output as failure even when the exit status is zero.
    pub fail_on_stderr: bool,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            gdal_translate: "gdal_translate".to_string(),
            gdalwarp: "gdalwarp".to_string(),
            gdalbuildvrt: "gdalbuildvrt".to_string(),
            gdal2tiles: "gdal2tiles.py".to_string(),
            timeout_secs: None,
            fail_on_stderr: false,
        }
    }
}

/// Options recognised by the pipeline driver for a single category run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub category: Category,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub resampling_kernel: Resampling,
    pub should_fetch: bool,
}

/// Everything the pipeline needs for one category, resolved from [`ToolConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub options: PipelineOptions,
    /// `<work_dir>/<category>`
    pub work_dir: PathBuf,
    /// `<tiles_dir>/<category>`
    pub publish_dir: PathBuf,
    /// `<clipping_shapes_dir>/<category>`
    pub cutline_dir: PathBuf,
    pub index_url: String,
    pub archive_host: String,
    pub target_srs: String,
    pub warp_resampling: Resampling,
    pub warp_memory_mb: u32,
}

impl ToolConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for category in Category::ALL {
            let (min, max) = self.zoom_range(category);
            if min > max {
                return Err(ConfigError::Validation(format!(
                    "{category}: min_zoom ({min}) must not exceed max_zoom ({max})"
                )));
            }
            if max > MAX_SUPPORTED_ZOOM {
                return Err(ConfigError::Validation(format!(
                    "{category}: max_zoom must be at most {MAX_SUPPORTED_ZOOM}"
                )));
            }
        }
        if !self.warp.resampling.supported_by_warp() {
            return Err(ConfigError::Validation(format!(
                "warp.resampling '{}' is not a gdalwarp kernel",
                self.warp.resampling
            )));
        }
        let programs = [
            ("toolkit.gdal_translate", &self.toolkit.gdal_translate),
            ("toolkit.gdalwarp", &self.toolkit.gdalwarp),
            ("toolkit.gdalbuildvrt", &self.toolkit.gdalbuildvrt),
            ("toolkit.gdal2tiles", &self.toolkit.gdal2tiles),
        ];
        for (key, program) in programs {
            if program.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.toolkit.timeout_secs == Some(0) || self.catalog.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Effective zoom range for a category after overrides.
    pub fn zoom_range(&self, category: Category) -> (u8, u8) {
        let overrides = self.categories.get(category);
        (
            overrides.min_zoom.unwrap_or(self.tiles.min_zoom),
            overrides.max_zoom.unwrap_or(self.tiles.max_zoom),
        )
    }

    /// Resolve the pipeline configuration for one category.
    pub fn pipeline_config(&self, category: Category, should_fetch: bool) -> PipelineConfig {
        let (min_zoom, max_zoom) = self.zoom_range(category);
        let overrides = self.categories.get(category);
        PipelineConfig {
            options: PipelineOptions {
                category,
                min_zoom,
                max_zoom,
                resampling_kernel: self.tiles.resampling,
                should_fetch,
            },
            work_dir: self.work_dir.join(category.name()),
            publish_dir: self.tiles_dir.join(category.name()),
            cutline_dir: self.clipping_shapes_dir.join(category.name()),
            index_url: self.catalog.index_url.clone(),
            archive_host: self.catalog.archive_host.clone(),
            target_srs: overrides
                .target_srs
                .clone()
                .unwrap_or_else(|| self.warp.target_srs.clone()),
            warp_resampling: self.warp.resampling,
            warp_memory_mb: self.warp.memory_mb,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ToolConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `path`, merged over stock defaults and validated.
///
/// A missing file is not an error: the stock defaults are returned.
pub fn load_config(path: &Path) -> Result<ToolConfig, ConfigError> {
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# chart-tiles configuration
# =========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.

# Staging area. Each category stages under <work_dir>/<category>/ with the
# directories 01_raw, 02_rgba, 03_cropped, 04_warped, 05_intermediate_tiles
# and its version ledger.
work_dir = "tmp"

# Published tiles. Each category is swapped into <tiles_dir>/<category>/.
tiles_dir = "tiles"

# Cutline shapefiles, laid out as <clipping_shapes_dir>/<category>/<chart>.shp
clipping_shapes_dir = "assets/clipping_shapes"

# ---------------------------------------------------------------------------
# Remote catalog
# ---------------------------------------------------------------------------
[catalog]
index_url = "https://www.faa.gov/air_traffic/flight_info/aeronav/digital_products/vfr/"

# Prefix of archive links: https://<archive_host>/<MM-DD-YYYY>/<kind>/<chart>.zip
archive_host = "aeronav.faa.gov/visual"

# HTTP timeout in seconds for the index page and each archive.
timeout_secs = 300

# ---------------------------------------------------------------------------
# Tile pyramid
# ---------------------------------------------------------------------------
[tiles]
min_zoom = 0
max_zoom = 11

# Kernel used by gdal2tiles: near, bilinear, cubic, cubicspline, lanczos,
# average, mode, antialias.
resampling = "antialias"

# ---------------------------------------------------------------------------
# Reprojection
# ---------------------------------------------------------------------------
[warp]
target_srs = "EPSG:3857"

# Kernel used by gdalwarp (antialias is not available there).
resampling = "lanczos"

# Working memory and block cache for gdalwarp, in megabytes.
memory_mb = 1024

# ---------------------------------------------------------------------------
# Per-category overrides (min_zoom, max_zoom, target_srs)
# ---------------------------------------------------------------------------
[categories.sectional]

[categories.tac]

[categories.planning]
max_zoom = 6

# ---------------------------------------------------------------------------
# External GIS toolkit
# ---------------------------------------------------------------------------
[toolkit]
gdal_translate = "gdal_translate"
gdalwarp = "gdalwarp"
gdalbuildvrt = "gdalbuildvrt"
gdal2tiles = "gdal2tiles.py"

# Treat any stderr output as failure even on a zero exit status.
fail_on_stderr = false

# Kill a single invocation after this many seconds.
# Omit to wait indefinitely.
# timeout_secs = 3600
"##
}
