//! Persistent record of the last fetched version of every chart.
//!
//! The ledger is what makes the fetch phase incremental: a chart is only
//! downloaded again when the catalog advertises a strictly newer version
//! than the one recorded here (or when its raw artifact has gone missing).
//!
//! ## Storage
//!
//! A JSON document at `<work_dir>/<category>/version_ledger.json`:
//!
//! ```json
//! { "version": 1, "charts": { "Seattle": "04-22-2021" } }
//! ```
//!
//! Every [`Ledger::set_version`] rewrites the whole document through a
//! temporary sibling and a rename, so a crash leaves either the old or the
//! new ledger on disk and never a torn one.
//!
//! ## Failure direction
//!
//! A missing, unreadable or corrupt ledger loads as empty. Every chart then
//! reads as [`ChartVersion::MIN`], which can only cause extra downloads,
//! never a skipped update.

use crate::types::{ChartId, ChartVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Version of the ledger file format. Bump to discard existing ledgers
/// when the format changes.
const LEDGER_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    charts: BTreeMap<ChartId, ChartVersion>,
}

/// Mapping `ChartId → ChartVersion`, bound to the file it persists to.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    charts: BTreeMap<ChartId, ChartVersion>,
}

impl Ledger {
    /// Load the ledger at `path`. Never fails; see the module docs.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let charts = match fs::read_to_string(&path) {
            Ok(content) => parse(&path, &content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, charts }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded version of `id`, or [`ChartVersion::MIN`] when there is none.
    pub fn get_version(&self, id: &ChartId) -> ChartVersion {
        self.charts.get(id).copied().unwrap_or(ChartVersion::MIN)
    }

    /// Record `version` for `id` and persist before returning.
    ///
    /// On error the in-memory record is rolled back so memory and disk
    /// agree.
    pub fn set_version(&mut self, id: ChartId, version: ChartVersion) -> io::Result<()> {
        let previous = self.charts.insert(id.clone(), version);
        if let Err(e) = self.persist() {
            match previous {
                Some(v) => self.charts.insert(id, v),
                None => self.charts.remove(&id),
            };
            return Err(e);
        }
        debug!(chart = %id, %version, "ledger updated");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Records in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChartId, ChartVersion)> {
        self.charts.iter().map(|(id, v)| (id, *v))
    }

    fn persist(&self) -> io::Result<()> {
        let file = LedgerFile {
            version: LEDGER_FORMAT_VERSION,
            charts: self.charts.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let tmp = temp_sibling(&self.path);
        {
            let mut out = fs::File::create(&tmp)?;
            out.write_all(json.as_bytes())?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        // Make the rename itself durable
        fs::File::open(parent)?.sync_all()
    }
}

fn parse(path: &Path, content: &str) -> BTreeMap<ChartId, ChartVersion> {
    match serde_json::from_str::<LedgerFile>(content) {
        Ok(file) if file.version == LEDGER_FORMAT_VERSION => file.charts,
        Ok(file) => {
            warn!(
                path = %path.display(),
                found = file.version,
                expected = LEDGER_FORMAT_VERSION,
                "ledger format version mismatch, starting empty"
            );
            BTreeMap::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ledger corrupt, starting empty");
            BTreeMap::new()
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
