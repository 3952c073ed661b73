//! Sequential fetch-then-convert over every configured target.
//!
//! Targets are processed one at a time. Whatever happens to one target
//! (non-200, transport error, corrupt archive) is recorded in the
//! [`RunReport`] and the next target is still attempted.

use std::path::Path;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use crate::archive::extract_archive;
use crate::fetcher::{ExportClient, ExportEndpoint, FetchOutcome, Fetcher};
use crate::models::{RunReport, Target, TargetOutcome};
use crate::storage::Storage;

pub struct Pipeline<'a, C, S> {
    fetcher: Fetcher<'a, C, S>,
}

impl<'a, C: ExportClient, S: Storage> Pipeline<'a, C, S> {
    pub fn new(
        client: &'a C,
        storage: &'a S,
        endpoint: &'a ExportEndpoint,
        output_root: &'a Path,
    ) -> Self {
        Self {
            fetcher: Fetcher {
                client,
                storage,
                endpoint,
                output_root,
            },
        }
    }

    /// Fetch and convert every target for `date`.
    #[instrument(level = "info", skip_all, fields(%date, targets = targets.len()))]
    pub async fn run(&self, targets: &[Target], date: NaiveDate) -> RunReport {
        let t0 = Instant::now();
        let mut report = RunReport::default();
        let mut current_site: Option<&str> = None;

        for target in targets {
            if current_site != Some(target.site_id.as_str()) {
                info!("Fetching Plausible statistics for {}...", target.site_id);
                current_site = Some(target.site_id.as_str());
            }
            let outcome = self.process_target(target, date).await;
            report.push(target.clone(), outcome);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.targets.len() - report.succeeded(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Run complete"
        );
        report
    }

    async fn process_target(&self, target: &Target, date: NaiveDate) -> TargetOutcome {
        let archive = match self.fetcher.fetch_export(target, date).await {
            Ok(FetchOutcome::Saved(path)) => path,
            Ok(FetchOutcome::Rejected(status)) => return TargetOutcome::Rejected { status },
            Err(e) => {
                error!(site = %target, error = %e, "Fetch failed; continuing with next target");
                return TargetOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match extract_archive(self.fetcher.storage, &archive).await {
            Ok(extracted) => TargetOutcome::Converted {
                archive,
                entries: extracted.len(),
            },
            Err(e) => {
                warn!(site = %target, archive = %archive.display(), error = %e, "Conversion failed");
                TargetOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
