//! Test fixtures: a canned [`ExportClient`] and in-memory zip archives.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use reqwest::StatusCode;
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::StatsError;
use crate::fetcher::ExportClient;
use crate::models::ExportResponse;

/// Answers from a fixed URL -> response table. Unknown URLs fail like a
/// refused connection.
#[derive(Debug, Default)]
pub struct MockClient {
    responses: HashMap<String, (StatusCode, Vec<u8>)>,
    requests: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn respond(mut self, url: &Url, status: StatusCode, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), (status, body));
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ExportClient for MockClient {
    async fn get(&self, url: &Url) -> Result<ExportResponse, StatsError> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.responses.get(url.as_str()) {
            Some((status, body)) => Ok(ExportResponse {
                status: *status,
                body: body.clone(),
            }),
            None => Err(StatsError::Transport {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// Build a deflated zip archive from `(name, contents)` pairs.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, contents) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(contents.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }
    buf
}
