//! Date and file-naming helpers.
//!
//! Output layout under the root directory:
//!
//! ```text
//! stats/
//! └── docs.python.org_2025-05-06/
//!     ├── docs.python.org_2025-05-06.prefix-3.12.zip
//!     ├── docs.python.org_2025-05-06.prefix-3.12.pages.json
//!     └── docs.python.org_2025-05-06.prefix-3.12.sources.json
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::Target;

/// The day to export: the UTC calendar day before `now`.
///
/// The provider only finalizes a day's numbers once it is over, so the
/// run always asks for yesterday regardless of the time of day.
pub fn reference_date(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive() - Duration::days(1)
}

/// Flatten a path prefix for use inside a file name (`a/b` -> `a-b`).
pub fn sanitize_prefix(prefix: &str) -> String {
    prefix.replace('/', "-")
}

/// `<site>_<date>`, shared by the per-day directory and archive names.
fn site_day(site_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", site_id, date.format("%Y-%m-%d"))
}

/// Directory holding every archive fetched for `site_id` on `date`.
pub fn export_dir(output_root: &Path, site_id: &str, date: NaiveDate) -> PathBuf {
    output_root.join(site_day(site_id, date))
}

/// `<site>_<date>.zip` or `<site>_<date>.prefix-<sanitized>.zip`.
pub fn archive_file_name(target: &Target, date: NaiveDate) -> String {
    let base = site_day(&target.site_id, date);
    if target.has_prefix() {
        format!("{}.prefix-{}.zip", base, sanitize_prefix(&target.prefix))
    } else {
        format!("{}.zip", base)
    }
}

/// Full archive path for `target` under `output_root`.
pub fn archive_path(output_root: &Path, target: &Target, date: NaiveDate) -> PathBuf {
    export_dir(output_root, &target.site_id, date).join(archive_file_name(target, date))
}

/// Sibling JSON path for one converted entry: `<archive-stem>.<entry-stem>.json`.
pub fn converted_path(archive: &Path, entry_stem: &str) -> PathBuf {
    let archive_stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    archive.with_file_name(format!("{}.{}.json", archive_stem, entry_stem))
}
