//! GDAL command-line backend.
//!
//! ## Command mapping
//!
//! | Operation | Command |
//! |---|---|
//! | Expand colors | `gdal_translate -expand rgba -of GTiff` |
//! | Crop | `gdalwarp -dstnodata 0 -q -cutline <shp> -crop_to_cutline -cblend 10 -of GTiff` |
//! | Warp | `gdalwarp -r <kernel> -overwrite -multi -wo NUM_THREADS=ALL_CPUS -t_srs <srs> -wm <mb> --config GDAL_CACHEMAX <mb> -co TILED=YES` |
//! | Mosaic | `gdalbuildvrt <out.vrt> <inputs...>` |
//! | Tiles | `gdal2tiles.py --profile=mercator -x -r <kernel> --xyz --zoom=<min>-<max>` |
//!
//! Programs run without a shell; paths are passed as separate arguments so
//! chart names with spaces or dots need no quoting.

use super::backend::{GisToolkit, ToolkitError};
use super::params::{CropParams, ExpandParams, MosaicParams, TileParams, WarpParams};
use crate::config::ToolkitConfig;
use std::ffi::OsString;
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often a child with a timeout is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Backend that shells out to the GDAL utilities.
pub struct GdalToolkit {
    config: ToolkitConfig,
}

impl GdalToolkit {
    pub fn new(config: ToolkitConfig) -> Self {
        Self { config }
    }

    /// Run one program to completion and map its outcome onto a result.
    fn run(&self, program: &str, args: Vec<OsString>) -> Result<(), ToolkitError> {
        debug!(program, ?args, "running toolkit command");
        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match self.config.timeout_secs {
            Some(secs) => run_with_timeout(program, command, Duration::from_secs(secs))?,
            None => command.output().map_err(|source| ToolkitError::Spawn {
                program: program.to_string(),
                source,
            })?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ToolkitError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            if self.config.fail_on_stderr {
                return Err(ToolkitError::Stderr {
                    program: program.to_string(),
                    stderr,
                });
            }
            warn!(program, %stderr, "toolkit wrote to stderr");
        }
        Ok(())
    }
}

/// Spawn `command`, killing it if it outlives `limit`.
///
/// Both pipes are drained on helper threads so a chatty child cannot block
/// on a full pipe while we wait for it.
fn run_with_timeout(
    program: &str,
    mut command: Command,
    limit: Duration,
) -> Result<Output, ToolkitError> {
    let mut child = command.spawn().map_err(|source| ToolkitError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= limit {
            // The child may exit between try_wait and kill; either way it is gone.
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolkitError::Timeout {
                program: program.to_string(),
                secs: limit.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout.map(join_drain).unwrap_or_default(),
        stderr: stderr.map(join_drain).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

fn os(s: impl Into<OsString>) -> OsString {
    s.into()
}

/// Argument list for `gdal_translate` color expansion.
pub fn expand_args(params: &ExpandParams) -> Vec<OsString> {
    vec![
        os("-expand"),
        os("rgba"),
        os("-of"),
        os("GTiff"),
        os(&params.source),
        os(&params.output),
    ]
}

/// Argument list for `gdalwarp` cutline cropping.
pub fn crop_args(params: &CropParams) -> Vec<OsString> {
    vec![
        os("-dstnodata"),
        os("0"),
        os("-q"),
        os("-cutline"),
        os(&params.cutline),
        os("-crop_to_cutline"),
        os("-cblend"),
        os("10"),
        os("-of"),
        os("GTiff"),
        os(&params.source),
        os(&params.output),
    ]
}

/// Argument list for `gdalwarp` reprojection.
pub fn warp_args(params: &WarpParams) -> Vec<OsString> {
    let memory = params.memory_mb.to_string();
    vec![
        os("-r"),
        os(params.resampling.as_str()),
        os("-overwrite"),
        os("-multi"),
        os("-wo"),
        os("NUM_THREADS=ALL_CPUS"),
        os("-t_srs"),
        os(params.target_srs.as_str()),
        os("-wm"),
        os(memory.as_str()),
        os("--config"),
        os("GDAL_CACHEMAX"),
        os(memory.as_str()),
        os("-co"),
        os("TILED=YES"),
        os(&params.source),
        os(&params.output),
    ]
}

/// Argument list for `gdalbuildvrt`.
pub fn mosaic_args(params: &MosaicParams) -> Vec<OsString> {
    let mut args = vec![os(&params.output)];
    args.extend(params.inputs.iter().map(|p| os(p)));
    args
}

/// Argument list for `gdal2tiles`.
pub fn tile_args(params: &TileParams) -> Vec<OsString> {
    vec![
        os("--profile=mercator"),
        os("-x"),
        os("-r"),
        os(params.resampling.as_str()),
        os("--xyz"),
        os(format!("--zoom={}", params.zoom_arg())),
        os(&params.mosaic),
        os(&params.output_dir),
    ]
}

impl GisToolkit for GdalToolkit {
    fn expand_colors(&self, params: &ExpandParams) -> Result<(), ToolkitError> {
        self.run(&self.config.gdal_translate, expand_args(params))
    }

    fn crop(&self, params: &CropParams) -> Result<(), ToolkitError> {
        if !params.cutline.exists() {
            return Err(ToolkitError::MissingCutline(params.cutline.clone()));
        }
        self.run(&self.config.gdalwarp, crop_args(params))
    }

    fn warp(&self, params: &WarpParams) -> Result<(), ToolkitError> {
        self.run(&self.config.gdalwarp, warp_args(params))
    }

    fn build_mosaic(&self, params: &MosaicParams) -> Result<(), ToolkitError> {
        self.run(&self.config.gdalbuildvrt, mosaic_args(params))
    }

    fn generate_tiles(&self, params: &TileParams) -> Result<(), ToolkitError> {
        self.run(&self.config.gdal2tiles, tile_args(params))
    }
}
