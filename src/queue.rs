//! Decides which advertised charts need downloading.
//!
//! A catalog entry is queued when either
//! - the raw artifact for its id is missing from the staging area, or
//! - its version is strictly newer than the ledger's record.
//!
//! The queue holds at most one entry per id. When the catalog lists the same
//! chart more than once, the newest version wins; among equal versions the
//! first one seen is kept.

use crate::catalog::CatalogEntry;
use crate::layout::{Stage, StageLayout};
use crate::ledger::Ledger;
use crate::types::ChartId;
use std::collections::HashMap;
use tracing::debug;

/// Deduplicated set of catalog entries to fetch, in first-seen order.
#[derive(Debug, Default)]
pub struct FetchQueue {
    entries: Vec<CatalogEntry>,
    index: HashMap<ChartId, usize>,
}

impl FetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry` unless an entry for the same id with an equal or newer
    /// version is already queued. A newer entry replaces the queued one in
    /// its original position.
    ///
    /// Returns whether the queue changed.
    pub fn offer(&mut self, entry: CatalogEntry) -> bool {
        match self.index.get(&entry.id) {
            Some(&pos) => {
                if entry.version > self.entries[pos].version {
                    self.entries[pos] = entry;
                    true
                } else {
                    false
                }
            }
            None => {
                self.index.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for FetchQueue {
    type Item = CatalogEntry;
    type IntoIter = std::vec::IntoIter<CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Whether `entry` must be fetched given the current ledger and raw stage.
pub fn needs_fetch(entry: &CatalogEntry, ledger: &Ledger, layout: &StageLayout) -> bool {
    !layout.has_artifact(Stage::Raw, &entry.id) || entry.version > ledger.get_version(&entry.id)
}

/// Build the fetch queue from scanned catalog entries.
pub fn build_fetch_queue<I>(entries: I, ledger: &Ledger, layout: &StageLayout) -> FetchQueue
where
    I: IntoIterator<Item = CatalogEntry>,
{
    let mut queue = FetchQueue::new();
    for entry in entries {
        if needs_fetch(&entry, ledger, layout) {
            debug!(
                chart = %entry.id,
                version = %entry.version,
                recorded = %ledger.get_version(&entry.id),
                "queued for fetch"
            );
            queue.offer(entry);
        }
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChartVersion;
    use std::fs;
    use tempfile::TempDir;

    fn entry(id: &str, version: &str, url: &str) -> CatalogEntry {
        CatalogEntry {
            id: ChartId::new(id),
            version: ChartVersion::parse(version).unwrap(),
            url: url.to_string(),
        }
    }

    fn setup() -> (TempDir, StageLayout, Ledger) {
        let tmp = TempDir::new().unwrap();
        let layout = StageLayout::new(tmp.path().join("sectional"));
        layout.create_directories().unwrap();
        let ledger = Ledger::load(layout.ledger_path());
        (tmp, layout, ledger)
    }

    fn commit_raw(layout: &StageLayout, id: &str) {
        fs::write(layout.artifact_path(Stage::Raw, &ChartId::new(id)), b"raw").unwrap();
    }

    #[test]
    fn newer_offer_replaces_in_place() {
        let mut queue = FetchQueue::new();
        queue.offer(entry("A", "01-01-2021", "a1"));
        queue.offer(entry("B", "01-01-2021", "b1"));
        assert!(queue.offer(entry("A", "02-01-2021", "a2")));

        let urls: Vec<&str> = queue.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["a2", "b1"]);
    }

    #[test]
    fn equal_version_keeps_first_seen() {
        let mut queue = FetchQueue::new();
        queue.offer(entry("A", "01-01-2021", "first"));
        assert!(!queue.offer(entry("A", "01-01-2021", "second")));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().unwrap().url, "first");
    }

    #[test]
    fn older_offer_is_dropped() {
        let mut queue = FetchQueue::new();
        queue.offer(entry("A", "06-01-2021", "new"));
        assert!(!queue.offer(entry("A", "01-01-2021", "old")));
        assert_eq!(queue.iter().next().unwrap().url, "new");
    }

    #[test]
    fn missing_raw_is_queued_even_when_recorded() {
        let (_tmp, layout, mut ledger) = setup();
        ledger
            .set_version("Seattle".into(), ChartVersion::parse("04-22-2021").unwrap())
            .unwrap();

        let queue = build_fetch_queue(
            vec![entry("Seattle", "04-22-2021", "u")],
            &ledger,
            &layout,
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn current_chart_is_not_queued() {
        let (_tmp, layout, mut ledger) = setup();
        commit_raw(&layout, "Seattle");
        ledger
            .set_version("Seattle".into(), ChartVersion::parse("04-22-2021").unwrap())
            .unwrap();

        let queue = build_fetch_queue(
            vec![
                entry("Seattle", "04-22-2021", "same"),
                entry("Seattle", "01-28-2021", "older"),
            ],
            &ledger,
            &layout,
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn newer_version_is_queued() {
        let (_tmp, layout, mut ledger) = setup();
        commit_raw(&layout, "Seattle");
        ledger
            .set_version("Seattle".into(), ChartVersion::parse("12-03-2020").unwrap())
            .unwrap();

        let queue = build_fetch_queue(
            vec![entry("Seattle", "01-28-2021", "new")],
            &ledger,
            &layout,
        );
        assert_eq!(queue.iter().next().unwrap().url, "new");
    }

    #[test]
    fn unrecorded_chart_with_raw_uses_min_sentinel() {
        let (_tmp, layout, ledger) = setup();
        commit_raw(&layout, "Denver");

        let queue = build_fetch_queue(
            vec![entry("Denver", "01-01-1901", "u")],
            &ledger,
            &layout,
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn duplicates_in_catalog_keep_newest() {
        let (_tmp, layout, ledger) = setup();
        let queue = build_fetch_queue(
            vec![
                entry("Seattle", "04-22-2021", "apr"),
                entry("Seattle", "06-17-2021", "jun"),
                entry("Seattle", "12-31-2020", "dec"),
            ],
            &ledger,
            &layout,
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.into_iter().next().unwrap().url, "jun");
    }
}
