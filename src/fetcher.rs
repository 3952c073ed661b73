//! Export endpoint access: URL construction, the HTTP client, and saving
//! the raw archive.
//!
//! # Architecture
//!
//! - [`ExportEndpoint`]: turns a [`Target`] and a date into an export URL
//! - [`ExportClient`]: trait for issuing the GET, so tests can stub it
//! - [`HttpExportClient`]: `reqwest` implementation with a fixed timeout
//!   and `Cache-Control: no-cache`
//! - [`Fetcher::fetch_export`]: one request, one archive on disk
//!
//! There is no retry. A non-200 answer is reported and the target skipped;
//! a transport error is returned to the caller.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{info, instrument, warn};
use url::Url;

use crate::config::{EndpointConfig, EndpointStyle};
use crate::errors::StatsError;
use crate::models::{ExportResponse, Target};
use crate::storage::Storage;
use crate::utils::{archive_path, export_dir};

/// Trait for issuing a GET against the export endpoint.
pub trait ExportClient {
    /// Fetch `url`. Any HTTP status is a successful response here; only
    /// connection-level failures are errors.
    async fn get(&self, url: &Url) -> Result<ExportResponse, StatsError>;
}

/// [`ExportClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpExportClient {
    client: Client,
}

impl HttpExportClient {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self, StatsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs))
            .default_headers(request_headers(endpoint)?)
            .build()
            .map_err(|e| StatsError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

/// `Cache-Control: no-cache` plus any static headers from config.
fn request_headers(endpoint: &EndpointConfig) -> Result<HeaderMap, StatsError> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    for (name, value) in &endpoint.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StatsError::Config(format!("invalid header name '{name}': {e}")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| StatsError::Config(format!("invalid value for header '{name}': {e}")))?;
        value.set_sensitive(true);
        headers.insert(name, value);
    }
    Ok(headers)
}

impl ExportClient for HttpExportClient {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &Url) -> Result<ExportResponse, StatsError> {
        let transport = |e: reqwest::Error| StatsError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let resp = self.client.get(url.clone()).send().await.map_err(transport)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(transport)?.to_vec();
        Ok(ExportResponse { status, body })
    }
}

/// Builds export URLs for one analytics host.
#[derive(Debug, Clone)]
pub struct ExportEndpoint {
    base: Url,
    style: EndpointStyle,
}

impl ExportEndpoint {
    pub fn new(base_url: &str, style: EndpointStyle) -> Result<Self, StatsError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(StatsError::Config(format!(
                "base URL '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self { base, style })
    }

    pub fn from_config(endpoint: &EndpointConfig) -> Result<Self, StatsError> {
        Self::new(&endpoint.base_url, endpoint.style)
    }

    /// `.../<site>[/<prefix>]/export?period=day&date=<date>&filters=<json>`
    pub fn export_url(&self, target: &Target, date: NaiveDate) -> Url {
        let mut url = self.base.clone();
        {
            // cannot_be_a_base was rejected in `new`
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(&target.site_id);
                if target.has_prefix() && self.style == EndpointStyle::PathSegment {
                    segments.extend(target.prefix.split('/').filter(|s| !s.is_empty()));
                }
                segments.push("export");
            }
        }
        url.query_pairs_mut()
            .append_pair("period", "day")
            .append_pair("date", &date.format("%Y-%m-%d").to_string())
            .append_pair("filters", &page_filter(target));
        url
    }
}

/// JSON filter array restricting results to pages under `/<prefix>/`.
fn page_filter(target: &Target) -> String {
    if target.has_prefix() {
        json!([["contains", "event:page", [format!("/{}/", target.prefix)]]]).to_string()
    } else {
        "[]".to_string()
    }
}

/// Result of a single export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Archive written to this path.
    Saved(PathBuf),
    /// Non-200 answer; nothing written.
    Rejected(StatusCode),
}

/// Fetches export archives into `output_root`.
#[derive(Debug)]
pub struct Fetcher<'a, C, S> {
    pub client: &'a C,
    pub storage: &'a S,
    pub endpoint: &'a ExportEndpoint,
    pub output_root: &'a Path,
}

impl<C: ExportClient, S: Storage> Fetcher<'_, C, S> {
    /// Download the export for `target` on `date` and save it verbatim.
    ///
    /// Returns [`FetchOutcome::Rejected`] on any non-200 status without
    /// touching storage. Transport and storage errors are returned.
    #[instrument(level = "info", skip_all, fields(site = %target, %date))]
    pub async fn fetch_export(
        &self,
        target: &Target,
        date: NaiveDate,
    ) -> Result<FetchOutcome, StatsError> {
        let url = self.endpoint.export_url(target, date);
        info!("Fetching Plausible statistics for {} from {}...", target, date);

        let t0 = Instant::now();
        let resp = self.client.get(&url).await?;
        let elapsed_ms = t0.elapsed().as_millis();

        if resp.status != StatusCode::OK {
            warn!(
                status = %resp.status,
                elapsed_ms,
                "Failed to fetch statistics for {} (HTTP {})",
                target,
                resp.status.as_u16()
            );
            return Ok(FetchOutcome::Rejected(resp.status));
        }
        info!(bytes = resp.body.len(), elapsed_ms, "Received {} bytes", resp.body.len());

        self.storage
            .ensure_dir(&export_dir(self.output_root, &target.site_id, date))
            .await?;
        let path = archive_path(self.output_root, target, date);
        self.storage.write(&path, &resp.body).await?;
        info!(path = %path.display(), "Saved statistics archive for {}", target);

        Ok(FetchOutcome::Saved(path))
    }
}
