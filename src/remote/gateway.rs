//! Remote gateway: dedup + retry over the transport, with a TTL cache in
//! front of the static catalog files.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::client::{HttpTransport, RemoteRequest, Transport};
use super::retry::RetryPolicy;
use crate::cache::{janitor, request_key, CacheStats, InFlightTracker, TtlCache};
use crate::config::Config;
use crate::error::GatewayError;
use crate::result::ApiResult;
use crate::types::{
  Achievement, CategoryCatalog, CategoryStat, StatisticsReport, TaskTemplate, TemplateCatalog,
};

pub const CATEGORIES_KEY: &str = "categories";
pub const TEMPLATES_KEY: &str = "taskTemplates";
pub const STATISTICS_KEY: &str = "statistics";

const CATEGORIES_FILE: &str = "categories.json";
const TEMPLATES_FILE: &str = "taskTemplates.json";
const STATISTICS_FILE: &str = "statistics.json";

/// Gateway configuration snapshot reported by `service_info`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
  pub version: &'static str,
  pub cache_stats: CacheStats,
  pub retry_attempts: u32,
  pub retry_delay_ms: u64,
  pub data_path: String,
  pub timestamp: DateTime<Utc>,
}

/// Single entry point for every call to the remote service.
///
/// Reads are deduplicated per request and retried with linear backoff.
/// Mutations go out exactly once: retrying a create that timed out after the
/// server committed it would duplicate the record.
pub struct RemoteGateway {
  transport: Arc<dyn Transport>,
  cache: Arc<TtlCache<Value>>,
  inflight: InFlightTracker<ApiResult<Value>>,
  retry: RetryPolicy,
  data_path: String,
}

impl RemoteGateway {
  pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
    let cache = TtlCache::new(config.api.cache_timeout()).with_max_size(config.cache.max_size);
    let data_path = if config.api.data_path.is_empty() || config.api.data_path.ends_with('/') {
      config.api.data_path.clone()
    } else {
      format!("{}/", config.api.data_path)
    };

    Self {
      transport,
      cache: Arc::new(cache),
      inflight: InFlightTracker::new(),
      retry: RetryPolicy::new(config.api.retry_attempts, config.api.retry_delay()),
      data_path,
    }
  }

  /// Gateway over HTTP to `api.base_url`.
  pub fn from_config(config: &Config) -> Result<Self> {
    let transport = HttpTransport::from_config(&config.api)?;
    Ok(Self::new(Arc::new(transport), config))
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    self.retry
  }

  /// Shared handle to the catalog cache.
  pub fn cache(&self) -> &Arc<TtlCache<Value>> {
    &self.cache
  }

  /// Start the periodic sweep of expired catalog entries.
  pub fn spawn_janitor(&self, period: Duration) -> JoinHandle<()> {
    janitor::spawn(&self.cache, period)
  }

  /// Fetch a resource, joining an identical in-flight call if one exists.
  pub async fn fetch_resource(&self, request: RemoteRequest) -> ApiResult<Value> {
    let key = request_key(&request.path, &request);
    let transport = Arc::clone(&self.transport);
    let retry = self.retry;

    self
      .inflight
      .dedupe(&key, move || async move {
        retry
          .execute(|_| {
            let transport = Arc::clone(&transport);
            let request = request.clone();
            async move { transport.send(&request).await }
          })
          .await
      })
      .await
  }

  /// Send a state-changing request once, without dedup or retry.
  pub async fn mutate_resource(&self, request: RemoteRequest) -> ApiResult<Value> {
    RetryPolicy::single()
      .execute(|_| self.transport.send(&request))
      .await
  }

  /// `fetch_resource`, decoding the body into `T`.
  pub async fn fetch_typed<T: DeserializeOwned>(&self, request: RemoteRequest) -> ApiResult<T> {
    decode(self.fetch_resource(request).await)
  }

  /// `mutate_resource`, decoding the body into `T`.
  pub async fn mutate_typed<T: DeserializeOwned>(&self, request: RemoteRequest) -> ApiResult<T> {
    decode(self.mutate_resource(request).await)
  }

  /// `mutate_typed` with `body` attached as JSON.
  pub async fn mutate_json<B, T>(&self, request: RemoteRequest, body: &B) -> ApiResult<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    match request.json(body) {
      Ok(request) => self.mutate_typed(request).await,
      Err(err) => ApiResult::failure(err.to_string()),
    }
  }

  pub fn cached_data(&self, key: &str) -> Option<Value> {
    self.cache.get(key)
  }

  pub fn set_cached_data(&self, key: impl Into<String>, value: Value) {
    self.cache.set(key, value);
  }

  pub fn clear_cache(&self) {
    self.cache.clear();
  }

  pub fn clear_cache_key(&self, key: &str) -> bool {
    self.cache.invalidate(key)
  }

  pub fn cache_stats(&self) -> CacheStats {
    self.cache.stats()
  }

  pub async fn get_categories(&self) -> Option<CategoryCatalog> {
    self.cached(CATEGORIES_KEY, CATEGORIES_FILE).await
  }

  pub async fn get_task_templates(&self) -> Option<TemplateCatalog> {
    self.cached(TEMPLATES_KEY, TEMPLATES_FILE).await
  }

  pub async fn get_statistics(&self) -> Option<StatisticsReport> {
    self.cached(STATISTICS_KEY, STATISTICS_FILE).await
  }

  pub async fn templates_by_category(&self, category: &str) -> Vec<TaskTemplate> {
    self
      .get_task_templates()
      .await
      .map(|catalog| catalog.by_category(category))
      .unwrap_or_default()
  }

  pub async fn templates_by_priority(&self, priority: &str) -> Vec<TaskTemplate> {
    self
      .get_task_templates()
      .await
      .map(|catalog| catalog.by_priority(priority))
      .unwrap_or_default()
  }

  pub async fn search_templates(&self, term: &str) -> Vec<TaskTemplate> {
    self
      .get_task_templates()
      .await
      .map(|catalog| catalog.search(term))
      .unwrap_or_default()
  }

  pub async fn category_statistics(&self, category: &str) -> Option<CategoryStat> {
    self.get_statistics().await?.category(category)
  }

  pub async fn achievements(&self) -> Vec<Achievement> {
    self
      .get_statistics()
      .await
      .map(|report| report.statistics.achievements)
      .unwrap_or_default()
  }

  /// One HEAD request for the categories file; true iff it answers 2xx.
  pub async fn check_connectivity(&self) -> bool {
    let request = RemoteRequest::head(format!("{}{}", self.data_path, CATEGORIES_FILE));
    match self.transport.send(&request).await {
      Ok(_) => true,
      Err(err) => {
        debug!("connectivity check failed: {}", err);
        false
      }
    }
  }

  pub fn service_info(&self) -> ServiceInfo {
    ServiceInfo {
      version: env!("CARGO_PKG_VERSION"),
      cache_stats: self.cache_stats(),
      retry_attempts: self.retry.max_attempts(),
      retry_delay_ms: self.retry.base_delay().as_millis() as u64,
      data_path: self.data_path.clone(),
      timestamp: Utc::now(),
    }
  }

  /// Cache-first read of a catalog file. Only payloads that decode are
  /// cached; failures return `None` and leave the cache untouched.
  async fn cached<T: DeserializeOwned>(&self, key: &str, file: &str) -> Option<T> {
    if let Some(value) = self.cache.get(key) {
      match serde_json::from_value(value) {
        Ok(data) => {
          debug!(key, "cache hit");
          return Some(data);
        }
        Err(e) => {
          warn!(key, "dropping undecodable cache entry: {}", e);
          self.cache.invalidate(key);
        }
      }
    }

    let request = RemoteRequest::get(format!("{}{}", self.data_path, file));
    match self.fetch_resource(request).await {
      ApiResult::Success(value) => match serde_json::from_value::<T>(value.clone()) {
        Ok(data) => {
          self.cache.set(key, value);
          Some(data)
        }
        Err(e) => {
          error!("Error fetching {}: {}", key, GatewayError::malformed(file, e));
          None
        }
      },
      ApiResult::Failure(failure) => {
        error!("Error fetching {}: {}", key, failure.error);
        None
      }
    }
  }
}

fn decode<T: DeserializeOwned>(result: ApiResult<Value>) -> ApiResult<T> {
  match result {
    ApiResult::Success(value) => match serde_json::from_value(value) {
      Ok(data) => ApiResult::success(data),
      Err(e) => ApiResult::failure(GatewayError::malformed("response body", e).to_string()),
    },
    ApiResult::Failure(failure) => ApiResult::Failure(failure),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::client::HttpMethod;
  use async_trait::async_trait;
  use serde_json::json;
  use std::collections::VecDeque;
  use std::sync::Mutex;

  /// Replays canned responses in order, after an optional delay.
  #[derive(Default)]
  struct Scripted {
    responses: Mutex<VecDeque<Result<Value, GatewayError>>>,
    seen: Mutex<Vec<RemoteRequest>>,
    delay: Duration,
  }

  impl Scripted {
    fn new(responses: Vec<Result<Value, GatewayError>>) -> Arc<Self> {
      Arc::new(Self {
        responses: Mutex::new(responses.into()),
        ..Default::default()
      })
    }

    fn delayed(responses: Vec<Result<Value, GatewayError>>, delay: Duration) -> Arc<Self> {
      Arc::new(Self {
        responses: Mutex::new(responses.into()),
        delay,
        ..Default::default()
      })
    }

    fn calls(&self) -> usize {
      self.seen.lock().unwrap().len()
    }
  }

  #[async_trait]
  impl Transport for Scripted {
    async fn send(&self, request: &RemoteRequest) -> Result<Value, GatewayError> {
      self.seen.lock().unwrap().push(request.clone());
      if !self.delay.is_zero() {
        tokio::time::sleep(self.delay).await;
      }
      self
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(GatewayError::Transport("connection refused".to_string())))
    }
  }

  fn config(retry_attempts: u32) -> Config {
    let mut config = Config::default();
    config.api.retry_attempts = retry_attempts;
    config.api.retry_delay_ms = 0;
    config
  }

  fn categories() -> Value {
    json!({"categories": [{"id": 1, "name": "work", "color": "#3b82f6"}, {"id": 2, "name": "personal"}]})
  }

  fn templates() -> Value {
    json!({"templates": [
      {"id": 1, "name": "Weekly review", "description": "Look back", "category": "work", "priority": "high", "tags": ["planning"]},
      {"id": 2, "name": "Groceries", "description": "Buy food", "category": "personal", "priority": "low", "tags": ["home"]}
    ]})
  }

  #[tokio::test]
  async fn test_cached_wrapper_reads_through_once() {
    let transport = Scripted::new(vec![Ok(categories())]);
    let gateway = RemoteGateway::new(transport.clone(), &config(3));

    let first = gateway.get_categories().await.unwrap();
    let second = gateway.get_categories().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.categories.len(), 2);
    assert_eq!(transport.calls(), 1);
    assert_eq!(
      transport.seen.lock().unwrap()[0].path,
      "data/categories.json"
    );
  }

  #[tokio::test]
  async fn test_templates_read_from_task_templates_file() {
    let transport = Scripted::new(vec![Ok(templates())]);
    let gateway = RemoteGateway::new(transport.clone(), &config(3));

    let catalog = gateway.get_task_templates().await.unwrap();

    assert_eq!(catalog.templates.len(), 2);
    assert_eq!(
      transport.seen.lock().unwrap()[0].path,
      "data/taskTemplates.json"
    );
    assert!(gateway.cached_data(TEMPLATES_KEY).is_some());
  }

  #[tokio::test]
  async fn test_failure_is_not_cached() {
    let transport = Scripted::new(vec![
      Err(GatewayError::Rejected {
        status: 500,
        message: "boom".to_string(),
      }),
      Ok(categories()),
    ]);
    let gateway = RemoteGateway::new(transport.clone(), &config(1));

    assert!(gateway.get_categories().await.is_none());
    assert!(gateway.cached_data(CATEGORIES_KEY).is_none());
    assert!(gateway.get_categories().await.is_some());
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_malformed_catalog_is_rejected_and_not_cached() {
    let transport = Scripted::new(vec![Ok(json!({"categories": "nope"}))]);
    let gateway = RemoteGateway::new(transport, &config(1));

    assert!(gateway.get_categories().await.is_none());
    assert_eq!(gateway.cache_stats().total_entries, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_identical_fetches_share_one_call() {
    let transport = Scripted::delayed(vec![Ok(json!({"x": 1}))], Duration::from_millis(50));
    let gateway = RemoteGateway::new(transport.clone(), &config(3));

    let (a, b) = tokio::join!(
      gateway.fetch_resource(RemoteRequest::get("x")),
      gateway.fetch_resource(RemoteRequest::get("x")),
    );

    assert_eq!(transport.calls(), 1);
    assert_eq!(a, b);
    assert_eq!(a.data(), Some(&json!({"x": 1})));
  }

  #[tokio::test(start_paused = true)]
  async fn test_different_credentials_are_not_deduplicated() {
    let transport = Scripted::delayed(
      vec![Ok(json!({"tasks": []})), Ok(json!({"tasks": []}))],
      Duration::from_millis(50),
    );
    let gateway = RemoteGateway::new(transport.clone(), &config(1));

    let _ = tokio::join!(
      gateway.fetch_resource(RemoteRequest::get("api/tasks").bearer("a")),
      gateway.fetch_resource(RemoteRequest::get("api/tasks").bearer("b")),
    );

    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_fetch_retries_but_mutate_does_not() {
    let transport = Scripted::new(vec![]);
    let gateway = RemoteGateway::new(transport.clone(), &config(3));

    let read = gateway.fetch_resource(RemoteRequest::get("api/tasks")).await;
    assert!(!read.is_success());
    assert_eq!(transport.calls(), 3);

    let write = gateway
      .mutate_resource(RemoteRequest::post("api/tasks"))
      .await;
    assert_eq!(write.error(), Some("network error: connection refused"));
    assert_eq!(transport.calls(), 4);
  }

  #[tokio::test]
  async fn test_fetch_typed_reports_shape_mismatch() {
    #[derive(Debug, serde::Deserialize)]
    struct Envelope {
      #[allow(dead_code)]
      task: Value,
    }

    let transport = Scripted::new(vec![Ok(json!({"message": "ok"}))]);
    let gateway = RemoteGateway::new(transport, &config(1));

    let result: ApiResult<Envelope> = gateway.fetch_typed(RemoteRequest::get("api/tasks/1")).await;
    assert!(result.error().unwrap().starts_with("malformed response"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_cached_data_expires_after_timeout() {
    let gateway = RemoteGateway::new(Scripted::new(vec![]), &config(1));
    gateway.set_cached_data("stats", json!({"x": 1}));

    tokio::time::advance(Duration::from_millis(299_999)).await;
    assert_eq!(gateway.cached_data("stats"), Some(json!({"x": 1})));

    tokio::time::advance(Duration::from_millis(2)).await;
    assert_eq!(gateway.cached_data("stats"), None);
  }

  #[tokio::test]
  async fn test_template_queries() {
    let transport = Scripted::new(vec![Ok(templates())]);
    let gateway = RemoteGateway::new(transport.clone(), &config(1));

    assert_eq!(gateway.templates_by_category("WORK").await.len(), 1);
    assert_eq!(gateway.templates_by_priority("low").await[0].name, "Groceries");
    assert_eq!(gateway.search_templates("plan").await[0].id, "1");
    assert!(gateway.search_templates("nothing").await.is_empty());
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test]
  async fn test_statistics_queries_degrade_to_empty() {
    let gateway = RemoteGateway::new(Scripted::new(vec![]), &config(1));
    assert!(gateway.achievements().await.is_empty());
    assert!(gateway.category_statistics("work").await.is_none());
  }

  #[tokio::test]
  async fn test_statistics_queries() {
    let transport = Scripted::new(vec![Ok(json!({"statistics": {
      "byCategory": [{"category": "work", "total": 4, "completed": 1}],
      "achievements": [{"id": 1, "name": "First task", "unlocked": true}]
    }}))]);
    let gateway = RemoteGateway::new(transport, &config(1));

    let stat = gateway.category_statistics("Work").await.unwrap();
    assert_eq!(stat.figures["total"], json!(4));
    let achievements = gateway.achievements().await;
    assert_eq!(achievements.len(), 1);
    assert!(achievements[0].unlocked);
  }

  #[tokio::test]
  async fn test_clear_cache_key() {
    let gateway = RemoteGateway::new(Scripted::new(vec![]), &config(1));
    gateway.set_cached_data(CATEGORIES_KEY, categories());
    gateway.set_cached_data(TEMPLATES_KEY, templates());

    assert!(gateway.clear_cache_key(CATEGORIES_KEY));
    assert!(!gateway.clear_cache_key(CATEGORIES_KEY));
    assert_eq!(gateway.cache_stats().total_entries, 1);

    gateway.clear_cache();
    assert_eq!(gateway.cache_stats().total_entries, 0);
  }

  #[tokio::test]
  async fn test_connectivity_is_a_single_head() {
    let transport = Scripted::new(vec![Ok(Value::Null)]);
    let gateway = RemoteGateway::new(transport.clone(), &config(3));

    assert!(gateway.check_connectivity().await);
    assert!(!gateway.check_connectivity().await);
    let seen = transport.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].method, HttpMethod::Head);
  }

  #[test]
  fn test_service_info_reflects_config() {
    let mut config = config(4);
    config.api.data_path = "static".to_string();
    let gateway = RemoteGateway::new(Scripted::new(vec![]), &config);

    let info = gateway.service_info();
    assert_eq!(info.retry_attempts, 4);
    assert_eq!(info.data_path, "static/");
    assert_eq!(info.cache_stats.cache_timeout_ms, 300_000);
  }
}
