//! Shared types used across all pipeline stages.
//!
//! [`ChartId`] is the join key between the ledger, the catalog and every
//! staging directory. [`ChartVersion`] is the publisher's revision date and
//! the only thing compared when deciding staleness. [`Category`] selects
//! which family of charts a run operates on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wire format of publisher revision dates (`MM-DD-YYYY`).
const VERSION_FORMAT: &str = "%m-%d-%Y";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid chart version '{0}': expected MM-DD-YYYY")]
    Invalid(String),
}

/// Stable name of one map sheet, e.g. `Seattle` or `Western_Aleutian_Islands`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartId(String);

impl ChartId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a new identifier by appending `_<suffix>` (used for split charts).
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}_{}", self.0, suffix))
    }
}

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChartId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Publisher revision date of a chart.
///
/// Always parsed from `MM-DD-YYYY` before comparison: `12-01-2020` is older
/// than `01-15-2021` even though it sorts after it as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChartVersion(NaiveDate);

impl ChartVersion {
    /// Sentinel for charts with no ledger record (`01-01-1900`).
    pub const MIN: ChartVersion = match NaiveDate::from_ymd_opt(1900, 1, 1) {
        Some(date) => ChartVersion(date),
        None => panic!("sentinel date must be valid"),
    };

    pub fn parse(s: &str) -> Result<Self, VersionError> {
        NaiveDate::parse_from_str(s.trim(), VERSION_FORMAT)
            .map(Self)
            .map_err(|_| VersionError::Invalid(s.to_string()))
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for ChartVersion {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl FromStr for ChartVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ChartVersion {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ChartVersion> for String {
    fn from(v: ChartVersion) -> Self {
        v.to_string()
    }
}

impl fmt::Display for ChartVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(VERSION_FORMAT))
    }
}

/// Publication family of a chart.
///
/// Each category has its own catalog URL pattern, staging area, ledger,
/// clipping shapes and published tile directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// VFR sectional charts.
    Sectional,
    /// Terminal area charts.
    Tac,
    /// VFR wall planning chart.
    Planning,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Sectional, Category::Tac, Category::Planning];

    /// Lowercase name used for directories and config tables.
    pub fn name(self) -> &'static str {
        match self {
            Category::Sectional => "sectional",
            Category::Tac => "tac",
            Category::Planning => "planning",
        }
    }

    /// Path segment between the version date and the archive name in
    /// publisher URLs.
    pub fn archive_segment(self) -> &'static str {
        match self {
            Category::Sectional => "sectional-files",
            Category::Tac => "tac-files",
            Category::Planning => "Planning",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
