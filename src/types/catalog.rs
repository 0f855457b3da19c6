//! Read-only catalog data served as static JSON files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCatalog {
  pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  #[serde(deserialize_with = "super::string_or_number")]
  pub id: String,
  pub name: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
  pub templates: Vec<TaskTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
  #[serde(deserialize_with = "super::string_or_number")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  pub category: String,
  pub priority: String,
  #[serde(default)]
  pub tags: Vec<String>,
  #[serde(default)]
  pub estimated_duration: Option<u32>,
  #[serde(default)]
  pub checklist: Vec<Value>,
}

impl TemplateCatalog {
  pub fn by_category(&self, category: &str) -> Vec<TaskTemplate> {
    self
      .templates
      .iter()
      .filter(|t| t.category.eq_ignore_ascii_case(category))
      .cloned()
      .collect()
  }

  pub fn by_priority(&self, priority: &str) -> Vec<TaskTemplate> {
    self
      .templates
      .iter()
      .filter(|t| t.priority.eq_ignore_ascii_case(priority))
      .cloned()
      .collect()
  }

  /// Case-insensitive substring match on name, description or any tag.
  pub fn search(&self, term: &str) -> Vec<TaskTemplate> {
    let term = term.to_lowercase();
    self
      .templates
      .iter()
      .filter(|t| {
        t.name.to_lowercase().contains(&term)
          || t.description.to_lowercase().contains(&term)
          || t.tags.iter().any(|tag| tag.to_lowercase().contains(&term))
      })
      .cloned()
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
  pub statistics: Statistics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
  #[serde(default)]
  pub global: Option<Value>,
  #[serde(default)]
  pub by_category: Vec<CategoryStat>,
  #[serde(default)]
  pub by_priority: Option<Value>,
  #[serde(default)]
  pub trends: Option<Value>,
  #[serde(default)]
  pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
  pub category: String,
  #[serde(flatten)]
  pub figures: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
  #[serde(default)]
  pub id: Option<Value>,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub icon: Option<String>,
  #[serde(default)]
  pub unlocked: bool,
  #[serde(default)]
  pub progress: Option<u32>,
  #[serde(default)]
  pub date: Option<String>,
}

impl StatisticsReport {
  pub fn category(&self, category: &str) -> Option<CategoryStat> {
    self
      .statistics
      .by_category
      .iter()
      .find(|s| s.category.eq_ignore_ascii_case(category))
      .cloned()
  }
}
