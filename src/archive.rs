//! Convert a saved export archive into JSON record sets.
//!
//! Each `*.csv` entry becomes `<archive-stem>.<entry-stem>.json` next to the
//! archive, holding an array of row objects keyed by the header row. Only
//! top-level entries are read; nested entries and non-CSV files are skipped.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use csv::ReaderBuilder;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

use crate::errors::StatsError;
use crate::models::{Record, RecordSet};
use crate::storage::Storage;
use crate::utils::converted_path;

const TABULAR_SUFFIX: &str = ".csv";

/// One parsed CSV entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularEntry {
    /// File stem of the entry, e.g. `pages` for `pages.csv`.
    pub stem: String,
    pub records: RecordSet,
}

/// Read every tabular entry of the archive at `archive_path`, write each as
/// JSON beside it, and return the record sets keyed by entry stem.
///
/// A corrupt archive or malformed CSV fails the whole archive.
#[instrument(level = "info", skip_all, fields(archive = %archive_path.display()))]
pub async fn extract_archive<S: Storage>(
    storage: &S,
    archive_path: &Path,
) -> Result<BTreeMap<String, RecordSet>, StatsError> {
    let bytes = storage.read(archive_path).await?;
    let entries = read_tabular_entries(archive_path, bytes)?;

    let mut extracted = BTreeMap::new();
    for entry in entries {
        let json_path = converted_path(archive_path, &entry.stem);
        storage.write(&json_path, &to_json(&entry.records)?).await?;
        info!(
            entry = %entry.stem,
            rows = entry.records.len(),
            path = %json_path.display(),
            "Converted entry to JSON"
        );
        extracted.insert(entry.stem, entry.records);
    }
    Ok(extracted)
}

/// Parse all top-level `.csv` entries from raw archive bytes, in archive order.
pub fn read_tabular_entries(
    archive_path: &Path,
    bytes: Vec<u8>,
) -> Result<Vec<TabularEntry>, StatsError> {
    let archive_err = |source: zip::result::ZipError| StatsError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;

    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(archive_err)?;
        let name = file.name().to_string();
        if !file.is_file() || !name.ends_with(TABULAR_SUFFIX) {
            debug!(entry = %name, "Skipping non-tabular entry");
            continue;
        }
        // nested tables would collide with top-level ones on the same stem
        if name.contains('/') {
            warn!(entry = %name, "Skipping nested entry");
            continue;
        }
        let stem = entry_stem(&name);
        info!(entry = %name, "Converting {} to JSON...", name);
        let records = parse_records(&name, file)?;
        entries.push(TabularEntry { stem, records });
    }
    Ok(entries)
}

/// `pages.csv` -> `pages`
fn entry_stem(name: &str) -> String {
    name.strip_suffix(TABULAR_SUFFIX).unwrap_or(name).to_string()
}

/// Parse CSV with the first row as header into one [`Record`] per data row.
///
/// Short rows get `null` for their missing columns and extra cells are
/// dropped, so every record carries exactly the header's keys. Python's
/// `csv.DictReader` would keep extras under a `null` key instead.
pub fn parse_records<R: Read>(entry: &str, reader: R) -> Result<RecordSet, StatsError> {
    let csv_err = |source: csv::Error| StatsError::Csv {
        entry: entry.to_string(),
        source,
    };
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();

    let mut records = Vec::new();
    for (line, row) in rdr.records().enumerate() {
        let row = row.map_err(csv_err)?;
        if row.len() > headers.len() {
            warn!(
                entry,
                row = line + 1,
                extra = row.len() - headers.len(),
                "Dropping cells beyond the header"
            );
        }
        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(col, key)| {
                let value = row
                    .get(col)
                    .map_or(Value::Null, |cell| Value::String(cell.to_string()));
                (key.to_string(), value)
            })
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// Serialize with zero indentation: one token per line, no leading spaces.
fn to_json(records: &RecordSet) -> Result<Vec<u8>, StatsError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b""));
    records.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::testing::zip_bytes;
    use serde_json::json;
    use std::path::PathBuf;

    const ARCHIVE: &str = "stats/example.org_2025-05-05/example.org_2025-05-05.zip";

    fn seeded(entries: &[(&str, &str)]) -> MemoryStorage {
        let storage = MemoryStorage::default();
        storage.insert(ARCHIVE, zip_bytes(entries));
        storage
    }

    fn json_file(storage: &MemoryStorage, path: &str) -> Value {
        serde_json::from_slice(&storage.file(path).expect("converted file")).unwrap()
    }

    #[test]
    fn test_parse_records_string_cells_in_order() {
        let records = parse_records("t.csv", "a,b\n1,2\n3,4\n".as_bytes()).unwrap();
        assert_eq!(
            Value::Array(records.into_iter().map(Value::Object).collect()),
            json!([{"a": "1", "b": "2"}, {"a": "3", "b": "4"}])
        );
    }

    #[test]
    fn test_parse_records_keeps_header_order() {
        let records = parse_records("t.csv", "visitors,date\n10,2025-05-05\n".as_bytes()).unwrap();
        let keys: Vec<_> = records[0].keys().cloned().collect();
        assert_eq!(keys, vec!["visitors", "date"]);
    }

    #[test]
    fn test_parse_records_ragged_rows_share_key_set() {
        let records = parse_records("t.csv", "a,b,c\n1\n1,2,3,4\n".as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(Value::Object(records[0].clone()), json!({"a": "1", "b": null, "c": null}));
        assert_eq!(Value::Object(records[1].clone()), json!({"a": "1", "b": "2", "c": "3"}));
    }

    #[test]
    fn test_parse_records_header_only() {
        let records = parse_records("t.csv", "a,b\n".as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_records_quoted_cells() {
        let records = parse_records("t.csv", "name,page\n\"Doe, J\",/a\n".as_bytes()).unwrap();
        assert_eq!(records[0]["name"], json!("Doe, J"));
    }

    #[test]
    fn test_entry_stem() {
        assert_eq!(entry_stem("pages.csv"), "pages");
        assert_eq!(entry_stem("imported_visitors.v2.csv"), "imported_visitors.v2");
    }

    #[test]
    fn test_to_json_zero_indent_layout() {
        let records = parse_records("t.csv", "a\n1\n".as_bytes()).unwrap();
        let text = String::from_utf8(to_json(&records).unwrap()).unwrap();
        assert_eq!(text, "[\n{\n\"a\": \"1\"\n}\n]");
        assert_eq!(to_json(&Vec::new()).unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_extract_archive_writes_sibling_json() {
        let storage = seeded(&[
            ("visitors.csv", "date,visitors\n2025-05-05,42\n"),
            ("pages.csv", "name,visitors\n/,10\n/about/,3\n"),
        ]);

        let extracted = extract_archive(&storage, Path::new(ARCHIVE)).await.unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted["pages"].len(), 2);

        assert_eq!(
            json_file(&storage, "stats/example.org_2025-05-05/example.org_2025-05-05.pages.json"),
            json!([{"name": "/", "visitors": "10"}, {"name": "/about/", "visitors": "3"}])
        );
        assert_eq!(
            json_file(&storage, "stats/example.org_2025-05-05/example.org_2025-05-05.visitors.json"),
            json!([{"date": "2025-05-05", "visitors": "42"}])
        );
    }

    #[tokio::test]
    async fn test_extract_archive_skips_non_tabular_entries() {
        let storage = seeded(&[
            ("README.txt", "not a table"),
            ("nested/", ""),
            ("sources.csv", "source,visitors\nDirect,5\n"),
        ]);

        let extracted = extract_archive(&storage, Path::new(ARCHIVE)).await.unwrap();
        assert_eq!(extracted.keys().collect::<Vec<_>>(), vec!["sources"]);
        // archive + one converted file
        assert_eq!(storage.paths().len(), 2);
    }

    #[tokio::test]
    async fn test_extract_archive_ignores_nested_entry_with_same_name() {
        let storage = seeded(&[
            ("pages.csv", "a\ntop\n"),
            ("old/pages.csv", "a\nnested\n"),
            ("old/sources.csv", "a\nnested\n"),
        ]);

        let extracted = extract_archive(&storage, Path::new(ARCHIVE)).await.unwrap();
        assert_eq!(extracted.keys().collect::<Vec<_>>(), vec!["pages"]);
        assert_eq!(Value::Object(extracted["pages"][0].clone()), json!({"a": "top"}));
        assert_eq!(
            json_file(&storage, "stats/example.org_2025-05-05/example.org_2025-05-05.pages.json"),
            json!([{"a": "top"}])
        );
        assert_eq!(storage.paths().len(), 2);
    }

    #[tokio::test]
    async fn test_extract_archive_without_tables_is_empty() {
        let storage = seeded(&[("notes.md", "# nothing here")]);
        let extracted = extract_archive(&storage, Path::new(ARCHIVE)).await.unwrap();
        assert!(extracted.is_empty());
        assert_eq!(storage.paths(), vec![PathBuf::from(ARCHIVE)]);
    }

    #[tokio::test]
    async fn test_extract_archive_corrupt_fails() {
        let storage = MemoryStorage::default();
        storage.insert(ARCHIVE, b"<html>rate limited</html>".to_vec());
        let err = extract_archive(&storage, Path::new(ARCHIVE)).await.unwrap_err();
        assert!(matches!(err, StatsError::Archive { .. }));
    }

    #[tokio::test]
    async fn test_extract_archive_missing_file_fails() {
        let storage = MemoryStorage::default();
        let err = extract_archive(&storage, Path::new(ARCHIVE)).await.unwrap_err();
        assert!(matches!(err, StatsError::Io(_)));
    }

    #[tokio::test]
    async fn test_extract_archive_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.org_2025-05-05.prefix-3.12.zip");
        std::fs::write(&archive, zip_bytes(&[("pages.csv", "a,b\n1,2\n")])).unwrap();

        let extracted = extract_archive(&crate::storage::FsStorage, &archive).await.unwrap();
        assert_eq!(extracted["pages"].len(), 1);

        let written = std::fs::read(tmp.path().join("a.org_2025-05-05.prefix-3.12.pages.json")).unwrap();
        let value: Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(value, json!([{"a": "1", "b": "2"}]));
    }
}
