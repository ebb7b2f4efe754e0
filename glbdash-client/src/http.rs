//! HTTP client layer
//!
//! Every request is a single attempt against the configured base URL. Any
//! transport failure or non-2xx response is logged and normalized into
//! [`Error::Network`], carrying the server's own message when it sent one.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use glbdash_core::{DashboardConfig, Error, Result};

const GENERIC_FAILURE: &str = "Something went wrong";

/// `{ success, data?, error? }` wrapper used by every JSON endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Turn `success: false` into a network error with the backend's message.
    pub fn into_result(self, fallback: &str) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(Error::network(
                self.error.filter(|e| !e.is_empty()).unwrap_or_else(|| fallback.to_string()),
            ))
        }
    }
}

/// Request payload
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(reqwest::multipart::Form),
}

/// A request relative to the client's base URL
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Path segments appended after `path`, escaped individually
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            segments: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one path segment, e.g. a record id
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Append query pairs
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn multipart(mut self, form: reqwest::multipart::Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Client for the model-library backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client with the configured base URL and timeout
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Self::with_http_client(http, &config.base_url)
    }

    /// Wrap an existing `reqwest` client
    pub fn with_http_client(http: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {:?}: {}", base_url, e)))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Retrieval URL of a stored model file
    pub fn file_url(&self, file_id: &str) -> String {
        match self.endpoint("upload/file", &[file_id.to_string()], &[]) {
            Ok(url) => url.into(),
            Err(_) => format!("{}/upload/file/{}", self.base_url, file_id),
        }
    }

    /// Absolute URL for `path`, followed by the escaped `segments`, with
    /// `query` appended
    pub fn endpoint(&self, path: &str, segments: &[String], query: &[(String, String)]) -> Result<Url> {
        let path = path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| Error::network(format!("invalid request URL: {}", e)))?;
        if !segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| Error::network(format!("cannot append path to {}", self.base_url)))?
                .pop_if_empty()
                .extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Send a request and decode the JSON response body
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let ApiRequest {
            method,
            path,
            segments,
            query,
            body,
            headers,
        } = request;
        let url = self.endpoint(&path, &segments, &query)?;

        let mut builder = self.http.request(method.clone(), url.clone()).headers(headers);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let bytes = self.send(builder, &method, &url).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            self.failure(&method, &url, None, format!("Invalid response from server: {}", e))
        })
    }

    /// Download raw bytes from an absolute URL
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::network(format!("invalid asset URL {:?}: {}", url, e)))?;
        let builder = self.http.get(parsed.clone());
        self.send(builder, &Method::GET, &parsed).await
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        method: &Method,
        url: &Url,
    ) -> Result<Bytes> {
        tracing::debug!(%method, %url, "sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| self.failure(method, url, None, transport_message(&e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.failure(method, url, Some(status), transport_message(&e)))?;

        if status.is_success() {
            return Ok(body);
        }

        let message = server_message(&body)
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
        Err(self.failure(method, url, Some(status), message))
    }

    fn failure(
        &self,
        method: &Method,
        url: &Url,
        status: Option<StatusCode>,
        message: String,
    ) -> Error {
        let status = status.map(|s| s.as_u16());
        tracing::error!(%method, %url, ?status, error = %message, "API request failed");
        Error::Network { message, status }
    }
}

/// Structured message from an error body such as `{"error": "..."}`
fn server_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    ["error", "message"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "Request timed out".to_string();
    }
    let message = err.to_string();
    if message.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        message
    }
}
