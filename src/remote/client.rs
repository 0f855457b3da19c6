//! HTTP transport to the TaskFlow service.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::config::ApiConfig;
use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
  Get,
  Head,
  Post,
  Put,
  Delete,
}

impl From<HttpMethod> for reqwest::Method {
  fn from(method: HttpMethod) -> Self {
    match method {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Head => reqwest::Method::HEAD,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Delete => reqwest::Method::DELETE,
    }
  }
}

/// One call to the service, relative to the configured base URL.
///
/// The serialized form of this struct is what the dedup key is built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteRequest {
  pub method: HttpMethod,
  pub path: String,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub query: BTreeMap<String, String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bearer: Option<String>,
}

impl RemoteRequest {
  fn new(method: HttpMethod, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      query: BTreeMap::new(),
      body: None,
      bearer: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(HttpMethod::Get, path)
  }

  pub fn head(path: impl Into<String>) -> Self {
    Self::new(HttpMethod::Head, path)
  }

  pub fn post(path: impl Into<String>) -> Self {
    Self::new(HttpMethod::Post, path)
  }

  pub fn put(path: impl Into<String>) -> Self {
    Self::new(HttpMethod::Put, path)
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self::new(HttpMethod::Delete, path)
  }

  /// Attach a JSON body. Serializing our own request types cannot fail in
  /// practice, but a failure is reported rather than dropped.
  pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, GatewayError> {
    let body =
      serde_json::to_value(body).map_err(|e| GatewayError::malformed("request body", e))?;
    self.body = Some(body);
    Ok(self)
  }

  pub fn bearer(mut self, token: impl Into<String>) -> Self {
    self.bearer = Some(token.into());
    self
  }

  pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.insert(key.into(), value.into());
    self
  }
}

/// The network seam. Returns the decoded JSON body of a 2xx response.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &RemoteRequest) -> Result<Value, GatewayError>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    // Url::join drops the last path segment unless the base ends with '/'
    let normalized = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };
    let base_url =
      Url::parse(&normalized).map_err(|e| eyre!("Invalid base URL {}: {}", base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  pub fn from_config(config: &ApiConfig) -> Result<Self> {
    Self::new(&config.base_url, config.request_timeout())
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: &RemoteRequest) -> Result<Value, GatewayError> {
    let url = self
      .base_url
      .join(request.path.trim_start_matches('/'))
      .map_err(|e| GatewayError::Transport(format!("invalid path {}: {}", request.path, e)))?;

    let mut builder = self
      .client
      .request(request.method.into(), url)
      .header(ACCEPT, "application/json");
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let Some(token) = &request.bearer {
      builder = builder.bearer_auth(token);
    }
    if let Some(body) = &request.body {
      builder = builder.header(CONTENT_TYPE, "application/json").json(body);
    }

    let response = builder.send().await?;
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
      return Err(GatewayError::Rejected {
        status: status.as_u16(),
        message: rejection_message(&bytes, status),
      });
    }

    if request.method == HttpMethod::Head || bytes.is_empty() {
      return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes).map_err(|e| GatewayError::malformed("response body", e))
  }
}

/// The service reports failures as `{ "error": "..." }`; fall back to the
/// status reason when the body says nothing useful.
fn rejection_message(body: &[u8], status: reqwest::StatusCode) -> String {
  serde_json::from_slice::<Value>(body)
    .ok()
    .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
    .unwrap_or_else(|| {
      status
        .canonical_reason()
        .unwrap_or("request rejected")
        .to_string()
    })
}
