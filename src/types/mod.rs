//! Entities shared by the remote and local paths.

mod catalog;
mod task;
mod user;

pub use catalog::{
  Achievement, Category, CategoryCatalog, CategoryStat, StatisticsReport, TaskTemplate,
  TemplateCatalog,
};
pub use task::{Priority, Task, TaskDraft, TaskPatch, TaskQuery, TaskSort, TaskStatus, TaskSummary};
pub use user::{
  Credentials, Language, LocalAccount, PasswordChange, Preferences, PreferencesPatch,
  ProfileDetails, ProfileUpdate, Registration, Session, SessionOrigin, Theme, UserProfile,
};

use serde::{Deserialize, Deserializer};

/// The file-backed server issues numeric ids; local accounts use strings.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Text(String),
    Number(u64),
  }

  Ok(match Id::deserialize(deserializer)? {
    Id::Text(s) => s,
    Id::Number(n) => n.to_string(),
  })
}

pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Text(String),
    Number(u64),
  }

  Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
    Id::Text(s) => s,
    Id::Number(n) => n.to_string(),
  }))
}
