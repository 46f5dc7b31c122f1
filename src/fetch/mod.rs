//! Remote fetch phase: catalog → queue → download → raw artifact → ledger.
//!
//! For each queued chart, in order:
//!
//! 1. **Sweep** every staged artifact of the chart (all stages, split
//!    halves included) so nothing derived from the previous version
//!    survives.
//! 2. **Download** the archive.
//! 3. **Extract** the raster and commit it as the raw artifact.
//! 4. **Record** the new version in the ledger.
//!
//! The ledger only advances after step 3 succeeds. If any step fails for a
//! chart, that chart is logged and skipped with its ledger record
//! untouched; because its raw artifact is now missing, the next run queues
//! it again.
//!
//! An unreachable catalog is not an error: the run proceeds with whatever
//! is already staged.

pub mod archive;
pub mod http;

pub use archive::{ArchiveError, extract_raster};
pub use http::{HttpClient, ReqwestClient};

use crate::catalog::CatalogScanner;
use crate::layout::{Stage, StageLayout};
use crate::ledger::Ledger;
use crate::queue::build_fetch_queue;
use crate::types::ChartId;
use std::io;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("archive for {id}: {source}")]
    Archive {
        id: ChartId,
        #[source]
        source: ArchiveError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of one fetch phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Whether the catalog index could be downloaded at all.
    pub catalog_available: bool,
    /// Catalog matches for the category, duplicates included.
    pub candidates: usize,
    /// Charts selected for download after dedup and staleness checks.
    pub queued: usize,
    pub fetched: Vec<ChartId>,
    pub failed: Vec<ChartId>,
}

/// Run the fetch phase for one category.
///
/// Only filesystem errors in the staging area or ledger abort the phase;
/// network and archive problems are per-chart and land in
/// [`FetchReport::failed`].
pub fn fetch_charts<H: HttpClient>(
    http: &H,
    scanner: &CatalogScanner,
    index_url: &str,
    ledger: &mut Ledger,
    layout: &StageLayout,
) -> Result<FetchReport, FetchError> {
    let mut report = FetchReport::default();

    let index = match http.get(index_url) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(url = index_url, error = %e, "catalog unavailable, nothing new to fetch");
            return Ok(report);
        }
    };
    report.catalog_available = true;

    layout.clear_temp_files(Stage::Raw)?;

    let entries: Vec<_> = scanner.entries(&index).collect();
    report.candidates = entries.len();
    let queue = build_fetch_queue(entries, ledger, layout);
    report.queued = queue.len();
    info!(
        category = %scanner.category(),
        candidates = report.candidates,
        queued = report.queued,
        "catalog scanned"
    );

    let raw_dir = layout.stage_dir(Stage::Raw);
    for entry in queue {
        let swept = layout.invalidate(&entry.id)?;
        if !swept.is_empty() {
            info!(chart = %entry.id, removed = swept.len(), "invalidated stale artifacts");
        }

        info!(chart = %entry.id, version = %entry.version, "fetching");
        let committed = http.get(&entry.url).and_then(|bytes| {
            extract_raster(&bytes, &raw_dir, &entry.id).map_err(|source| FetchError::Archive {
                id: entry.id.clone(),
                source,
            })
        });

        match committed {
            Ok(_) => {
                ledger.set_version(entry.id.clone(), entry.version)?;
                report.fetched.push(entry.id);
            }
            Err(e) => {
                warn!(chart = %entry.id, url = %entry.url, error = %e, "fetch failed, skipping");
                report.failed.push(entry.id);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::http::tests::MockHttpClient;
    use super::*;
    use crate::test_helpers::build_zip;
    use crate::types::{Category, ChartVersion};
    use std::fs;
    use tempfile::TempDir;

    const INDEX_URL: &str = "https://faa.test/vfr";
    const HOST: &str = "aeronav.faa.gov/visual";

    fn archive_url(version: &str, id: &str) -> String {
        format!("https://{HOST}/{version}/sectional-files/{id}.zip")
    }

    fn index_for(links: &[String]) -> String {
        links
            .iter()
            .map(|l| format!("<a href=\"{l}\">x</a>\n"))
            .collect()
    }

    struct Fixture {
        _tmp: TempDir,
        layout: StageLayout,
        ledger: Ledger,
        http: MockHttpClient,
        scanner: CatalogScanner,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let layout = StageLayout::new(tmp.path().join("sectional"));
            layout.create_directories().unwrap();
            let ledger = Ledger::load(layout.ledger_path());
            Self {
                _tmp: tmp,
                layout,
                ledger,
                http: MockHttpClient::new(),
                scanner: CatalogScanner::new(HOST, Category::Sectional),
            }
        }

        fn publish(&self, version: &str, id: &str, raster: &[u8]) -> String {
            let url = archive_url(version, id);
            let name = format!("{id} SEC.tif");
            self.http.serve(&url, build_zip(&[(name.as_str(), raster)]));
            url
        }

        fn fetch(&mut self) -> FetchReport {
            fetch_charts(
                &self.http,
                &self.scanner,
                INDEX_URL,
                &mut self.ledger,
                &self.layout,
            )
            .unwrap()
        }
    }

    #[test]
    fn unreachable_catalog_is_nothing_new() {
        let mut fx = Fixture::new();
        let report = fx.fetch();
        assert!(!report.catalog_available);
        assert_eq!(report.queued, 0);
        assert!(fx.ledger.is_empty());
    }

    #[test]
    fn fetch_commits_raw_then_records_version() {
        let mut fx = Fixture::new();
        let url = fx.publish("04-22-2021", "Seattle", b"raster");
        fx.http.serve(INDEX_URL, index_for(&[url]));

        let report = fx.fetch();

        assert_eq!(report.fetched, vec![ChartId::new("Seattle")]);
        let id = ChartId::new("Seattle");
        assert_eq!(
            fs::read(fx.layout.artifact_path(Stage::Raw, &id)).unwrap(),
            b"raster"
        );
        assert_eq!(
            Ledger::load(fx.layout.ledger_path()).get_version(&id),
            ChartVersion::parse("04-22-2021").unwrap()
        );
    }

    #[test]
    fn second_fetch_downloads_nothing() {
        let mut fx = Fixture::new();
        let url = fx.publish("04-22-2021", "Seattle", b"raster");
        fx.http.serve(INDEX_URL, index_for(&[url]));
        fx.fetch();

        let report = fx.fetch();

        assert_eq!(report.candidates, 1);
        assert_eq!(report.queued, 0);
        let archive_requests = fx
            .http
            .get_requests()
            .iter()
            .filter(|u| u.ends_with(".zip"))
            .count();
        assert_eq!(archive_requests, 1);
    }

    #[test]
    fn failed_download_leaves_ledger_unchanged() {
        let mut fx = Fixture::new();
        let good = fx.publish("04-22-2021", "Seattle", b"raster");
        let missing = archive_url("04-22-2021", "Denver");
        fx.http.serve(INDEX_URL, index_for(&[missing, good]));

        let report = fx.fetch();

        assert_eq!(report.failed, vec![ChartId::new("Denver")]);
        assert_eq!(report.fetched, vec![ChartId::new("Seattle")]);
        assert_eq!(fx.ledger.get_version(&"Denver".into()), ChartVersion::MIN);
        assert!(!fx.layout.has_artifact(Stage::Raw, &"Denver".into()));
    }

    #[test]
    fn bad_archive_leaves_ledger_unchanged() {
        let mut fx = Fixture::new();
        let url = archive_url("04-22-2021", "Seattle");
        fx.http.serve(&url, b"not a zip".to_vec());
        fx.http.serve(INDEX_URL, index_for(&[url]));

        let report = fx.fetch();

        assert_eq!(report.failed.len(), 1);
        assert!(fx.ledger.is_empty());
        assert!(fx.layout.artifacts(Stage::Raw).unwrap().is_empty());
    }

    #[test]
    fn newer_version_sweeps_downstream_artifacts() {
        let mut fx = Fixture::new();
        let old = fx.publish("01-28-2021", "Seattle", b"old");
        fx.http.serve(INDEX_URL, index_for(&[old]));
        fx.fetch();

        let id = ChartId::new("Seattle");
        for stage in [Stage::Colored, Stage::Cropped, Stage::Warped] {
            fs::write(fx.layout.artifact_path(stage, &id), b"derived").unwrap();
        }

        let new = fx.publish("03-25-2021", "Seattle", b"new");
        fx.http.serve(INDEX_URL, index_for(&[new]));
        let report = fx.fetch();

        assert_eq!(report.fetched, vec![id.clone()]);
        assert_eq!(fs::read(fx.layout.artifact_path(Stage::Raw, &id)).unwrap(), b"new");
        for stage in [Stage::Colored, Stage::Cropped, Stage::Warped] {
            assert!(!fx.layout.has_artifact(stage, &id), "{:?} survived", stage);
        }
        assert_eq!(
            fx.ledger.get_version(&id),
            ChartVersion::parse("03-25-2021").unwrap()
        );
    }

    #[test]
    fn stale_raw_temp_files_are_cleared() {
        let mut fx = Fixture::new();
        let stale = fx.layout.temp_path(Stage::Raw, &"Seattle".into());
        fs::write(&stale, b"half").unwrap();
        fx.http.serve(INDEX_URL, "");

        fx.fetch();

        assert!(!stale.exists());
    }
}
