//! Extracts `(id, version, url)` triples from the publisher's index page.
//!
//! The index is treated as opaque text: archive links are found by pattern,
//! not by parsing HTML. A link looks like
//!
//! ```text
//! https://aeronav.faa.gov/visual/04-22-2021/sectional-files/Seattle.zip
//!                                 └─version─┘ └─segment──┘  └──id──┘
//! ```
//!
//! where the segment selects the category (`sectional-files`, `tac-files`
//! or `Planning`). The same archive usually appears several times on the
//! page and several editions may be listed; deduplication is the queue
//! builder's job, so the scanner yields every match.

use crate::types::{Category, ChartId, ChartVersion};
use regex::Regex;

/// One advertised archive. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: ChartId,
    pub version: ChartVersion,
    pub url: String,
}

/// Archive link matcher for one category.
#[derive(Debug, Clone)]
pub struct CatalogScanner {
    category: Category,
    pattern: Regex,
}

impl CatalogScanner {
    /// `archive_host` is the host and path prefix that precedes the
    /// version date, e.g. `aeronav.faa.gov/visual`.
    pub fn new(archive_host: &str, category: Category) -> Self {
        let host = regex::escape(archive_host.trim_end_matches('/'));
        let segment = regex::escape(category.archive_segment());
        let pattern = format!(
            r"https?://{host}/(\d{{2}}-\d{{2}}-\d{{4}})/{segment}/([A-Za-z0-9_.\-]+)\.zip"
        );
        // Every interpolated piece is escaped, so the pattern always compiles
        let pattern = Regex::new(&pattern).expect("Valid catalog regex");
        Self { category, pattern }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Lazily scan `text` for archive links of this category.
    ///
    /// Matches whose date is not a real calendar date are dropped.
    pub fn entries<'a>(&'a self, text: &'a str) -> impl Iterator<Item = CatalogEntry> + 'a {
        self.pattern.captures_iter(text).filter_map(|caps| {
            let url = caps.get(0)?.as_str();
            let version = ChartVersion::parse(caps.get(1)?.as_str()).ok()?;
            let id = ChartId::new(caps.get(2)?.as_str());
            Some(CatalogEntry {
                id,
                version,
                url: url.to_string(),
            })
        })
    }
}
