//! HTTP collaborator used to reach the DEEP backend.
//!
//! The router only sees the [`Transport`] trait. [`HttpTransport`] is the
//! production implementation on top of a blocking `reqwest` client; tests
//! substitute in-process stubs.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::DatasourceSettings;

/// Accept header value for endpoints that answer with protobuf.
pub const ACCEPT_PROTOBUF: &str = "application/protobuf";

/// HTTP method of a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A request against the backend, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub method: Method,
    /// Path starting with `/`, e.g. `/api/snapshots/abc`.
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Header names are lowercased, so each header appears once.
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl BackendRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            ..Self::get(path)
        }
    }

    pub fn post_json(path: impl Into<String>, body: &serde_json::Value) -> Self {
        let request = Self {
            method: Method::Post,
            body: Some(body.to_string().into_bytes()),
            ..Self::get(path)
        };
        request.with_header("Content-Type", "application/json")
    }

    /// Caller headers are applied first so request-specific ones win,
    /// whatever the case of their names.
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        let mut merged = merge_headers(headers, &BTreeMap::new());
        merged.append(&mut self.headers);
        self.headers = merged;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn with_query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }
}

/// Merge two header sets under lowercased names. Entries of `overrides`
/// replace entries of `base` that differ only in case.
pub fn merge_headers(
    base: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    base.iter()
        .chain(overrides)
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

/// Response of a backend call. The body is read at most once by the
/// decoder and released when the response is dropped.
pub struct BackendResponse {
    pub status: u16,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Box<dyn Read + Send>,
}

impl BackendResponse {
    /// Build a response from an in-memory body.
    pub fn from_bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Box::new(std::io::Cursor::new(body.into())),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body.
    pub fn read_body(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl std::fmt::Debug for BackendResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes backend requests. Implementations must be shareable across the
/// worker threads of a dispatch.
pub trait Transport: Send + Sync {
    fn execute(&self, request: BackendRequest) -> Result<BackendResponse>;
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(settings: &DatasourceSettings) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: BackendRequest) -> Result<BackendResponse> {
        let url = self.url(&request.path);
        debug!(method = ?request.method, url = %url, "backend request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send()?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        Ok(BackendResponse {
            status,
            headers,
            body: Box::new(response),
        })
    }
}
