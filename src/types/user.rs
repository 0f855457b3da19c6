use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark,
  Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  Es,
  En,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
  #[serde(default)]
  pub theme: Theme,
  #[serde(default)]
  pub language: Language,
  #[serde(default = "default_true")]
  pub notifications: bool,
}

impl Default for Preferences {
  fn default() -> Self {
    Self {
      theme: Theme::default(),
      language: Language::default(),
      notifications: true,
    }
  }
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
  #[serde(default)]
  pub avatar: Option<String>,
  #[serde(default)]
  pub bio: String,
  #[serde(default)]
  pub preferences: Preferences,
}

/// The signed-in user as exposed to callers (never carries a password).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  #[serde(deserialize_with = "super::string_or_number")]
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub profile: ProfileDetails,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub theme: Option<Theme>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub language: Option<Language>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notifications: Option<bool>,
}

/// PUT body for the profile; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bio: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub preferences: Option<PreferencesPatch>,
}

impl UserProfile {
  pub fn apply_update(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) {
    if let Some(name) = &update.name {
      self.name = name.trim().to_string();
    }
    if let Some(bio) = &update.bio {
      self.profile.bio = bio.trim().to_string();
    }
    if let Some(prefs) = &update.preferences {
      let current = &mut self.profile.preferences;
      if let Some(theme) = prefs.theme {
        current.theme = theme;
      }
      if let Some(language) = prefs.language {
        current.language = language;
      }
      if let Some(notifications) = prefs.notifications {
        current.notifications = notifications;
      }
    }
    self.updated_at = Some(now);
  }
}

/// A user record kept in the local store for offline sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAccount {
  pub user: UserProfile,
  pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrigin {
  Remote,
  Local,
}

/// The current sign-in. A remote session carries the bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub token: Option<String>,
  pub user: UserProfile,
  pub origin: SessionOrigin,
  pub started_at: DateTime<Utc>,
}

impl Session {
  pub fn remote(token: String, user: UserProfile, now: DateTime<Utc>) -> Self {
    Self {
      token: Some(token),
      user,
      origin: SessionOrigin::Remote,
      started_at: now,
    }
  }

  pub fn local(user: UserProfile, now: DateTime<Utc>) -> Self {
    Self {
      token: None,
      user,
      origin: SessionOrigin::Local,
      started_at: now,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
  pub name: String,
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
  pub current_password: String,
  pub new_password: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_server_user_payload_decodes() {
    let json = r#"{
      "id": 4, "name": "Ana", "email": "ana@example.com", "role": "user", "isActive": true,
      "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z",
      "profile": {"avatar": null, "bio": "", "preferences": {"theme": "dark", "language": "en", "notifications": false}}
    }"#;
    let user: UserProfile = serde_json::from_str(json).unwrap();
    assert_eq!(user.id, "4");
    assert_eq!(user.profile.preferences.theme, Theme::Dark);
    assert!(!user.profile.preferences.notifications);
    assert_eq!(user.last_login, None);
  }

  #[test]
  fn test_apply_update_merges_fieldwise() {
    let mut user = UserProfile {
      id: "1".to_string(),
      name: "Ana".to_string(),
      email: "ana@example.com".to_string(),
      profile: ProfileDetails::default(),
      created_at: None,
      updated_at: None,
      last_login: None,
    };
    let now = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
    let update = ProfileUpdate {
      bio: Some("  hello ".to_string()),
      preferences: Some(PreferencesPatch {
        theme: Some(Theme::Dark),
        ..PreferencesPatch::default()
      }),
      ..ProfileUpdate::default()
    };

    user.apply_update(&update, now);

    assert_eq!(user.name, "Ana");
    assert_eq!(user.profile.bio, "hello");
    assert_eq!(user.profile.preferences.theme, Theme::Dark);
    assert_eq!(user.profile.preferences.language, Language::Es);
    assert_eq!(user.updated_at, Some(now));
  }
}
