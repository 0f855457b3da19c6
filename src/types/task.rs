use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StoreError;

const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
  Urgent,
}

impl Priority {
  /// Sort rank, most pressing first.
  pub fn rank(self) -> u8 {
    match self {
      Priority::Urgent => 0,
      Priority::High => 1,
      Priority::Medium => 2,
      Priority::Low => 3,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
  #[default]
  Pending,
  InProgress,
  Completed,
  Cancelled,
}

/// A task as stored on either path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: u64,
  #[serde(
    default,
    deserialize_with = "super::opt_string_or_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub user_id: Option<String>,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub priority: Priority,
  #[serde(default)]
  pub status: TaskStatus,
  #[serde(default)]
  pub category: String,
  /// ISO 8601 date or date-time, as entered.
  #[serde(default)]
  pub due_date: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a task. Also the POST body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<Priority>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<TaskStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tags: Vec<String>,
}

/// Partial update. Also the PUT body; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<Priority>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<TaskStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
}

impl TaskPatch {
  pub fn status(status: TaskStatus) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }
}

impl Task {
  /// Build a new task the way the server does: trimmed title, blank tags
  /// dropped, defaults for priority and status.
  pub fn from_draft(
    id: u64,
    user_id: Option<String>,
    draft: &TaskDraft,
    now: DateTime<Utc>,
  ) -> Result<Self, StoreError> {
    let title = validate_title(&draft.title)?;
    let mut task = Self {
      id,
      user_id,
      title,
      description: draft
        .description
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string(),
      priority: draft.priority.unwrap_or_default(),
      status: TaskStatus::Pending,
      category: draft
        .category
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string(),
      due_date: draft.due_date.clone(),
      tags: clean_tags(&draft.tags),
      created_at: now,
      updated_at: now,
      completed_at: None,
    };
    task.set_status(draft.status.unwrap_or_default(), now);
    task.updated_at = now;
    Ok(task)
  }

  pub fn apply_patch(&mut self, patch: &TaskPatch, now: DateTime<Utc>) -> Result<(), StoreError> {
    if let Some(title) = &patch.title {
      self.title = validate_title(title)?;
    }
    if let Some(description) = &patch.description {
      self.description = description.trim().to_string();
    }
    if let Some(priority) = patch.priority {
      self.priority = priority;
    }
    if let Some(status) = patch.status {
      self.set_status(status, now);
    }
    if let Some(category) = &patch.category {
      self.category = category.trim().to_string();
    }
    if let Some(due_date) = &patch.due_date {
      self.due_date = Some(due_date.clone());
    }
    if let Some(tags) = &patch.tags {
      self.tags = clean_tags(tags);
    }
    self.updated_at = now;
    Ok(())
  }

  /// `completedAt` is stamped once on completion and cleared by any other status.
  fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
    self.status = status;
    if status == TaskStatus::Completed {
      if self.completed_at.is_none() {
        self.completed_at = Some(now);
      }
    } else {
      self.completed_at = None;
    }
  }

  /// Status a toggle moves this task to.
  pub fn toggled_status(&self) -> TaskStatus {
    if self.status == TaskStatus::Completed {
      TaskStatus::Pending
    } else {
      TaskStatus::Completed
    }
  }

  pub fn due_at(&self) -> Option<DateTime<Utc>> {
    self.due_date.as_deref().and_then(parse_due_date)
  }

  pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
    self.is_open() && self.due_at().is_some_and(|due| due < now)
  }

  fn is_open(&self) -> bool {
    matches!(self.status, TaskStatus::Pending | TaskStatus::InProgress)
  }
}

fn validate_title(title: &str) -> Result<String, StoreError> {
  let title = title.trim();
  if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
    return Err(StoreError::Validation(format!(
      "task title must be between 1 and {} characters",
      MAX_TITLE_LEN
    )));
  }
  Ok(title.to_string())
}

fn clean_tags(tags: &[String]) -> Vec<String> {
  tags
    .iter()
    .map(|t| t.trim())
    .filter(|t| !t.is_empty())
    .map(String::from)
    .collect()
}

fn parse_due_date(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|dt| dt.and_utc())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskSort {
  #[default]
  DueDate,
  Priority,
  Category,
  CreatedAt,
  Title,
}

/// Client-side filter over a working set.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
  pub search: Option<String>,
  pub status: Option<TaskStatus>,
  pub priority: Option<Priority>,
  pub category: Option<String>,
  pub sort: TaskSort,
}

impl TaskQuery {
  pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
    let term = self.search.as_deref().map(|s| s.trim().to_lowercase());

    let mut matched: Vec<Task> = tasks
      .iter()
      .filter(|task| match term.as_deref() {
        Some(term) if !term.is_empty() => {
          task.title.to_lowercase().contains(term)
            || task.description.to_lowercase().contains(term)
        }
        _ => true,
      })
      .filter(|task| self.status.map_or(true, |s| task.status == s))
      .filter(|task| self.priority.map_or(true, |p| task.priority == p))
      .filter(|task| {
        self
          .category
          .as_deref()
          .map_or(true, |c| task.category == c)
      })
      .cloned()
      .collect();

    match self.sort {
      // Undated tasks go last.
      TaskSort::DueDate => matched.sort_by_key(|t| (t.due_at().is_none(), t.due_at())),
      TaskSort::Priority => matched.sort_by_key(|t| t.priority.rank()),
      TaskSort::Category => matched.sort_by(|a, b| a.category.cmp(&b.category)),
      TaskSort::CreatedAt => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
      TaskSort::Title => matched.sort_by_key(|t| t.title.to_lowercase()),
    }

    matched
  }
}

/// Counters over a working set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
  pub pending: usize,
  pub completed: usize,
  pub overdue: usize,
  pub by_category: BTreeMap<String, usize>,
}

impl TaskSummary {
  pub fn from_tasks(tasks: &[Task], now: DateTime<Utc>) -> Self {
    let mut summary = Self::default();
    for task in tasks {
      match task.status {
        TaskStatus::Completed => summary.completed += 1,
        TaskStatus::Pending | TaskStatus::InProgress => {
          summary.pending += 1;
          if task.is_overdue(now) {
            summary.overdue += 1;
          }
        }
        TaskStatus::Cancelled => {}
      }
      *summary.by_category.entry(task.category.clone()).or_insert(0) += 1;
    }
    summary
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
  }

  fn draft(title: &str) -> TaskDraft {
    TaskDraft {
      title: title.to_string(),
      ..TaskDraft::default()
    }
  }

  #[test]
  fn test_from_draft_applies_server_defaults() {
    let d = TaskDraft {
      title: "  Write report  ".to_string(),
      tags: vec!["work".to_string(), "  ".to_string()],
      ..TaskDraft::default()
    };
    let task = Task::from_draft(1, Some("7".to_string()), &d, now()).unwrap();

    assert_eq!(task.title, "Write report");
    assert_eq!(task.priority, Priority::Medium);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.tags, vec!["work".to_string()]);
    assert_eq!(task.completed_at, None);
  }

  #[test]
  fn test_blank_title_is_rejected() {
    let err = Task::from_draft(1, None, &draft("   "), now()).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
  }

  #[test]
  fn test_completed_at_stamped_once_and_cleared() {
    let mut task = Task::from_draft(1, None, &draft("a"), now()).unwrap();

    task
      .apply_patch(&TaskPatch::status(TaskStatus::Completed), now())
      .unwrap();
    assert_eq!(task.completed_at, Some(now()));

    let later = now() + Duration::hours(1);
    task
      .apply_patch(&TaskPatch::status(TaskStatus::Completed), later)
      .unwrap();
    assert_eq!(task.completed_at, Some(now()));
    assert_eq!(task.updated_at, later);

    task
      .apply_patch(&TaskPatch::status(TaskStatus::Pending), later)
      .unwrap();
    assert_eq!(task.completed_at, None);
  }

  #[test]
  fn test_deserializes_server_payload_with_numeric_user_id() {
    let json = r#"{
      "id": 3, "userId": 12, "title": "t", "description": "", "priority": "urgent",
      "status": "in-progress", "category": "", "dueDate": null, "tags": [],
      "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z",
      "completedAt": null, "checklist": [], "notes": "", "attachments": []
    }"#;
    let task: Task = serde_json::from_str(json).unwrap();
    assert_eq!(task.user_id.as_deref(), Some("12"));
    assert_eq!(task.priority, Priority::Urgent);
    assert_eq!(task.status, TaskStatus::InProgress);
  }

  #[test]
  fn test_query_filters_and_sorts() {
    let mut a = Task::from_draft(1, None, &draft("Buy milk"), now()).unwrap();
    a.priority = Priority::Low;
    a.category = "home".to_string();
    let mut b = Task::from_draft(2, None, &draft("Ship release"), now()).unwrap();
    b.priority = Priority::Urgent;
    b.category = "work".to_string();
    let mut c = Task::from_draft(3, None, &draft("Milk the cow"), now()).unwrap();
    c.priority = Priority::High;
    c.category = "home".to_string();
    let tasks = vec![a, b, c];

    let query = TaskQuery {
      search: Some("MILK".to_string()),
      sort: TaskSort::Priority,
      ..TaskQuery::default()
    };
    let ids: Vec<u64> = query.apply(&tasks).iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![3, 1]);

    let query = TaskQuery {
      category: Some("work".to_string()),
      ..TaskQuery::default()
    };
    assert_eq!(query.apply(&tasks).len(), 1);
  }

  #[test]
  fn test_summary_counts_overdue_only_for_open_tasks() {
    let mut overdue = Task::from_draft(1, None, &draft("late"), now()).unwrap();
    overdue.due_date = Some("2024-05-01".to_string());
    overdue.category = "work".to_string();
    let mut done = Task::from_draft(2, None, &draft("done"), now()).unwrap();
    done.due_date = Some("2024-05-01".to_string());
    done
      .apply_patch(&TaskPatch::status(TaskStatus::Completed), now())
      .unwrap();
    done.category = "work".to_string();

    let summary = TaskSummary::from_tasks(&[overdue, done], now());
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.overdue, 1);
    assert_eq!(summary.by_category.get("work"), Some(&2));
  }
}
