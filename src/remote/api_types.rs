//! Wire envelopes returned by the TaskFlow service, and request bodies that
//! differ from the public input types.

use serde::{Deserialize, Serialize};

use crate::types::{PasswordChange, Registration, Task, UserProfile};

pub const TASKS_PATH: &str = "api/tasks";
pub const PROFILE_PATH: &str = "api/users/profile";
pub const REGISTER_PATH: &str = "api/auth/register";
pub const LOGIN_PATH: &str = "api/auth/login";
pub const LOGOUT_PATH: &str = "api/auth/logout";
pub const ME_PATH: &str = "api/auth/me";
pub const CHANGE_PASSWORD_PATH: &str = "api/auth/change-password";

/// Page size large enough to pull a user's whole list in one request.
pub const TASK_LIST_LIMIT: &str = "1000";

pub fn task_path(id: u64) -> String {
  format!("{}/{}", TASKS_PATH, id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskListResponse {
  pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskResponse {
  pub task: Task,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserResponse {
  pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
  pub token: String,
  pub user: UserProfile,
  #[serde(default)]
  pub message: Option<String>,
}

/// The register route also validates a confirmation field.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody<'a> {
  pub name: &'a str,
  pub email: &'a str,
  pub password: &'a str,
  pub confirm_password: &'a str,
}

impl<'a> From<&'a Registration> for RegisterBody<'a> {
  fn from(r: &'a Registration) -> Self {
    Self {
      name: &r.name,
      email: &r.email,
      password: &r.password,
      confirm_password: &r.password,
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody<'a> {
  pub current_password: &'a str,
  pub new_password: &'a str,
  pub confirm_password: &'a str,
}

impl<'a> From<&'a PasswordChange> for ChangePasswordBody<'a> {
  fn from(c: &'a PasswordChange) -> Self {
    Self {
      current_password: &c.current_password,
      new_password: &c.new_password,
      confirm_password: &c.new_password,
    }
  }
}
