//! Data models shared across the fetch and conversion stages.
//!
//! - [`Target`]: one (site, path prefix) pair to export
//! - [`Record`] / [`RecordSet`]: one converted CSV table
//! - [`RunReport`]: per-target outcomes collected over a whole run

use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;

/// One CSV row keyed by header column, in header order.
///
/// Cells are strings; a column missing from a short row is `null`.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// All data rows of one tabular entry, in source order.
pub type RecordSet = Vec<Record>;

/// A site identifier plus an optional path prefix.
///
/// An empty prefix means whole-site statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub site_id: String,
    pub prefix: String,
}

impl Target {
    pub fn new(site_id: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            prefix: prefix.into(),
        }
    }

    pub fn whole_site(site_id: impl Into<String>) -> Self {
        Self::new(site_id, "")
    }

    pub fn has_prefix(&self) -> bool {
        !self.prefix.is_empty()
    }
}

impl fmt::Display for Target {
    /// Renders as `site/` or `site/prefix/`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_prefix() {
            write!(f, "{}/{}/", self.site_id, self.prefix)
        } else {
            write!(f, "{}/", self.site_id)
        }
    }
}

/// Raw HTTP response from the export endpoint.
#[derive(Debug, Clone)]
pub struct ExportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// What happened to a single target during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Archive saved and every CSV entry converted.
    Converted { archive: PathBuf, entries: usize },
    /// The export endpoint answered with a non-200 status; nothing was written.
    Rejected { status: StatusCode },
    /// Transport, storage, or conversion error.
    Failed { reason: String },
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TargetOutcome::Converted { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: Target,
    pub outcome: TargetOutcome,
}

/// Outcomes of every target attempted in one run, in processing order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub targets: Vec<TargetReport>,
}

impl RunReport {
    pub fn push(&mut self, target: Target, outcome: TargetOutcome) {
        self.targets.push(TargetReport { target, outcome });
    }

    pub fn succeeded(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| !t.outcome.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures().next().is_none()
    }
}
