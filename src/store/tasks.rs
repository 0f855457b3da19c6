//! Task list backed by the service when signed in, local storage otherwise.

use chrono::Utc;
use std::sync::Arc;

use super::fallback::{with_fallback, Outcome, Source};
use super::session::AuthCapability;
use crate::error::StoreError;
use crate::local::{namespace_key, LocalCollectionStore};
use crate::remote::api_types::{
  task_path, TaskListResponse, TaskResponse, TASKS_PATH, TASK_LIST_LIMIT,
};
use crate::remote::{RemoteGateway, RemoteRequest};
use crate::result::ApiResult;
use crate::types::{Task, TaskDraft, TaskPatch, TaskQuery, TaskSummary};

pub const TASKS_PREFIX: &str = "tasks";

/// Dual-backend task store.
///
/// Every operation re-checks the capability. A remote success is adopted
/// into the working set and not written locally; a local run persists the
/// whole collection under the signed-in user's namespace and the working set
/// becomes that collection.
pub struct TaskStore {
  gateway: Option<Arc<RemoteGateway>>,
  local: LocalCollectionStore,
  auth: Arc<dyn AuthCapability>,
  tasks: Vec<Task>,
  last_source: Option<Source>,
}

impl TaskStore {
  pub fn new(
    gateway: Option<Arc<RemoteGateway>>,
    local: LocalCollectionStore,
    auth: Arc<dyn AuthCapability>,
  ) -> Self {
    Self {
      gateway,
      local,
      auth,
      tasks: Vec::new(),
      last_source: None,
    }
  }

  /// The working set.
  pub fn tasks(&self) -> &[Task] {
    &self.tasks
  }

  /// Path that served the most recent operation.
  pub fn last_source(&self) -> Option<Source> {
    self.last_source
  }

  /// Key the local collection lives under for the current user.
  pub fn namespace(&self) -> String {
    namespace_key(TASKS_PREFIX, self.auth.current_identity().as_deref())
  }

  pub async fn list(&mut self) -> ApiResult<Vec<Task>> {
    ApiResult::from(self.list_inner().await)
  }

  pub async fn create(&mut self, draft: &TaskDraft) -> ApiResult<Task> {
    ApiResult::from(self.create_inner(draft).await)
  }

  pub async fn update(&mut self, id: u64, patch: &TaskPatch) -> ApiResult<Task> {
    ApiResult::from(self.update_inner(id, patch).await)
  }

  pub async fn delete(&mut self, id: u64) -> ApiResult<()> {
    ApiResult::from(self.delete_inner(id).await)
  }

  /// Flip between completed and pending.
  ///
  /// The current status comes from the working set. A task missing from it
  /// triggers a `list` first, so a signed-in user toggles the service's copy
  /// rather than whatever the local store holds.
  pub async fn toggle_status(&mut self, id: u64) -> ApiResult<Task> {
    let task = match self.find(id).await {
      Ok(task) => task,
      Err(e) => return ApiResult::failure(e.to_string()),
    };
    let patch = TaskPatch::status(task.toggled_status());
    self.update(id, &patch).await
  }

  /// Filter and sort the working set.
  pub fn filter(&self, query: &TaskQuery) -> Vec<Task> {
    query.apply(&self.tasks)
  }

  pub fn summary(&self) -> TaskSummary {
    TaskSummary::from_tasks(&self.tasks, Utc::now())
  }

  fn remote(&self) -> Option<(Arc<RemoteGateway>, String)> {
    if !self.auth.is_authenticated() {
      return None;
    }
    let gateway = self.gateway.clone()?;
    let token = self.auth.current_credential()?;
    Some((gateway, token))
  }

  async fn find(&mut self, id: u64) -> Result<Task, StoreError> {
    if !self.tasks.iter().any(|t| t.id == id) {
      self.list_inner().await?;
    }
    self
      .tasks
      .iter()
      .find(|t| t.id == id)
      .cloned()
      .ok_or_else(|| not_found(id))
  }

  async fn list_inner(&mut self) -> Result<Vec<Task>, StoreError> {
    let key = self.namespace();
    let remote = self.remote().map(|(gateway, token)| async move {
      let request = RemoteRequest::get(TASKS_PATH)
        .query("limit", TASK_LIST_LIMIT)
        .bearer(token);
      gateway.fetch_typed::<TaskListResponse>(request).await
    });
    let outcome = with_fallback("list tasks", remote, || {
      self.local.read_collection::<Task>(&key)
    })
    .await?;

    self.last_source = Some(outcome.source());
    self.tasks = match outcome {
      Outcome::Remote(response) => response.tasks,
      Outcome::Local(tasks) => tasks,
    };
    Ok(self.tasks.clone())
  }

  async fn create_inner(&mut self, draft: &TaskDraft) -> Result<Task, StoreError> {
    let key = self.namespace();
    let remote = self.remote().map(|(gateway, token)| async move {
      gateway
        .mutate_json::<_, TaskResponse>(RemoteRequest::post(TASKS_PATH).bearer(token), draft)
        .await
    });
    let outcome = with_fallback("create task", remote, || self.create_local(&key, draft)).await?;

    self.last_source = Some(outcome.source());
    Ok(self.adopt(outcome))
  }

  async fn update_inner(&mut self, id: u64, patch: &TaskPatch) -> Result<Task, StoreError> {
    let key = self.namespace();
    let remote = self.remote().map(|(gateway, token)| async move {
      gateway
        .mutate_json::<_, TaskResponse>(RemoteRequest::put(task_path(id)).bearer(token), patch)
        .await
    });
    let outcome =
      with_fallback("update task", remote, || self.update_local(&key, id, patch)).await?;

    self.last_source = Some(outcome.source());
    Ok(self.adopt(outcome))
  }

  async fn delete_inner(&mut self, id: u64) -> Result<(), StoreError> {
    let key = self.namespace();
    let remote = self.remote().map(|(gateway, token)| async move {
      gateway
        .mutate_resource(RemoteRequest::delete(task_path(id)).bearer(token))
        .await
    });
    let outcome = with_fallback("delete task", remote, || self.delete_local(&key, id)).await?;

    self.last_source = Some(outcome.source());
    match outcome {
      Outcome::Remote(_) => self.tasks.retain(|t| t.id != id),
      Outcome::Local(tasks) => self.tasks = tasks,
    }
    Ok(())
  }

  /// Install the result of a create or update into the working set.
  fn adopt(&mut self, outcome: Outcome<TaskResponse, (Task, Vec<Task>)>) -> Task {
    match outcome {
      Outcome::Remote(TaskResponse { task }) => {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
          Some(existing) => *existing = task.clone(),
          None => self.tasks.push(task.clone()),
        }
        task
      }
      Outcome::Local((task, tasks)) => {
        self.tasks = tasks;
        task
      }
    }
  }

  fn create_local(&self, key: &str, draft: &TaskDraft) -> Result<(Task, Vec<Task>), StoreError> {
    let mut tasks: Vec<Task> = self.local.read_collection(key)?;
    let id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
    let task = Task::from_draft(id, self.auth.current_identity(), draft, Utc::now())?;

    tasks.push(task.clone());
    self.local.write_collection(key, &tasks)?;
    Ok((task, tasks))
  }

  fn update_local(
    &self,
    key: &str,
    id: u64,
    patch: &TaskPatch,
  ) -> Result<(Task, Vec<Task>), StoreError> {
    let mut tasks: Vec<Task> = self.local.read_collection(key)?;
    let task = tasks
      .iter_mut()
      .find(|t| t.id == id)
      .ok_or_else(|| not_found(id))?;

    task.apply_patch(patch, Utc::now())?;
    let task = task.clone();
    self.local.write_collection(key, &tasks)?;
    Ok((task, tasks))
  }

  fn delete_local(&self, key: &str, id: u64) -> Result<Vec<Task>, StoreError> {
    let mut tasks: Vec<Task> = self.local.read_collection(key)?;
    let index = tasks
      .iter()
      .position(|t| t.id == id)
      .ok_or_else(|| not_found(id))?;

    tasks.remove(index);
    self.local.write_collection(key, &tasks)?;
    Ok(tasks)
  }
}

fn not_found(id: u64) -> StoreError {
  StoreError::NotFound(format!("task {}", id))
}
