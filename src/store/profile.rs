use chrono::Utc;
use std::sync::Arc;

use super::fallback::{with_fallback, Outcome, Source};
use super::session::AuthCapability;
use crate::error::StoreError;
use crate::local::{namespace_key, LocalCollectionStore};
use crate::remote::api_types::{UserResponse, PROFILE_PATH};
use crate::remote::{RemoteGateway, RemoteRequest};
use crate::result::ApiResult;
use crate::types::{Preferences, PreferencesPatch, ProfileUpdate, UserProfile};

pub const PROFILE_PREFIX: &str = "profile";

/// Dual-backend store for the signed-in user's profile.
pub struct ProfileStore {
  gateway: Option<Arc<RemoteGateway>>,
  local: LocalCollectionStore,
  auth: Arc<dyn AuthCapability>,
  profile: Option<UserProfile>,
  last_source: Option<Source>,
}

impl ProfileStore {
  pub fn new(
    gateway: Option<Arc<RemoteGateway>>,
    local: LocalCollectionStore,
    auth: Arc<dyn AuthCapability>,
  ) -> Self {
    Self {
      gateway,
      local,
      auth,
      profile: None,
      last_source: None,
    }
  }

  pub fn profile(&self) -> Option<&UserProfile> {
    self.profile.as_ref()
  }

  pub fn last_source(&self) -> Option<Source> {
    self.last_source
  }

  pub async fn load(&mut self) -> ApiResult<UserProfile> {
    ApiResult::from(self.load_inner().await)
  }

  pub async fn update(&mut self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
    ApiResult::from(self.update_inner(update).await)
  }

  /// Replace all three preferences at once.
  pub async fn update_preferences(&mut self, preferences: Preferences) -> ApiResult<UserProfile> {
    let update = ProfileUpdate {
      preferences: Some(PreferencesPatch {
        theme: Some(preferences.theme),
        language: Some(preferences.language),
        notifications: Some(preferences.notifications),
      }),
      ..ProfileUpdate::default()
    };
    self.update(&update).await
  }

  fn remote(&self) -> Option<(Arc<RemoteGateway>, String)> {
    if !self.auth.is_authenticated() {
      return None;
    }
    let gateway = self.gateway.clone()?;
    let token = self.auth.current_credential()?;
    Some((gateway, token))
  }

  fn key(&self) -> Result<String, StoreError> {
    let identity = self
      .auth
      .current_identity()
      .ok_or(StoreError::NotAuthenticated)?;
    Ok(namespace_key(PROFILE_PREFIX, Some(&identity)))
  }

  /// Stored profile, or the session's copy of the user if none was saved.
  fn load_local(&self) -> Result<UserProfile, StoreError> {
    let key = self.key()?;
    match self.local.read_record::<UserProfile>(&key)? {
      Some(profile) => Ok(profile),
      None => self.auth.current_user().ok_or(StoreError::NotAuthenticated),
    }
  }

  fn update_local(&self, update: &ProfileUpdate) -> Result<UserProfile, StoreError> {
    let mut profile = self.load_local()?;
    profile.apply_update(update, Utc::now());
    self.local.write_record(&self.key()?, &profile)?;
    Ok(profile)
  }

  async fn load_inner(&mut self) -> Result<UserProfile, StoreError> {
    let remote = self.remote().map(|(gateway, token)| async move {
      gateway
        .fetch_typed::<UserResponse>(RemoteRequest::get(PROFILE_PATH).bearer(token))
        .await
    });
    let outcome = with_fallback("load profile", remote, || self.load_local()).await?;
    Ok(self.adopt(outcome))
  }

  async fn update_inner(&mut self, update: &ProfileUpdate) -> Result<UserProfile, StoreError> {
    let remote = self.remote().map(|(gateway, token)| async move {
      gateway
        .mutate_json::<_, UserResponse>(RemoteRequest::put(PROFILE_PATH).bearer(token), update)
        .await
    });
    let outcome = with_fallback("update profile", remote, || self.update_local(update)).await?;
    Ok(self.adopt(outcome))
  }

  fn adopt(&mut self, outcome: Outcome<UserResponse, UserProfile>) -> UserProfile {
    self.last_source = Some(outcome.source());
    let profile = match outcome {
      Outcome::Remote(response) => response.user,
      Outcome::Local(profile) => profile,
    };
    self.profile = Some(profile.clone());
    profile
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::local::{KeyValueStore, MemoryKvStore};
  use crate::store::session::SessionState;
  use crate::types::{Language, ProfileDetails, Session, Theme};

  fn user() -> UserProfile {
    UserProfile {
      id: "local-1".to_string(),
      name: "Ana".to_string(),
      email: "ana@example.com".to_string(),
      profile: ProfileDetails::default(),
      created_at: None,
      updated_at: None,
      last_login: None,
    }
  }

  fn store(signed_in: bool) -> (Arc<MemoryKvStore>, ProfileStore) {
    let kv = Arc::new(MemoryKvStore::new());
    let local = LocalCollectionStore::new(kv.clone());
    let session = Arc::new(SessionState::restore(local.clone()).unwrap());
    if signed_in {
      session.start(Session::local(user(), Utc::now())).unwrap();
    }
    (kv, ProfileStore::new(None, local, session))
  }

  #[tokio::test]
  async fn test_load_falls_back_to_session_user() {
    let (_, mut profiles) = store(true);
    let profile = profiles.load().await.into_data().unwrap();
    assert_eq!(profile.email, "ana@example.com");
    assert_eq!(profiles.last_source(), Some(Source::Local));
  }

  #[tokio::test]
  async fn test_anonymous_has_no_profile() {
    let (_, mut profiles) = store(false);
    assert_eq!(profiles.load().await.error(), Some("not signed in"));
  }

  #[tokio::test]
  async fn test_update_persists_under_user_namespace() {
    let (kv, mut profiles) = store(true);
    let update = ProfileUpdate {
      name: Some("Ana Maria".to_string()),
      bio: Some("Planner".to_string()),
      ..ProfileUpdate::default()
    };

    let updated = profiles.update(&update).await.into_data().unwrap();
    assert_eq!(updated.name, "Ana Maria");
    assert!(updated.updated_at.is_some());
    assert!(kv.get("profile_local-1").unwrap().unwrap().contains("Planner"));

    let reloaded = profiles.load().await.into_data().unwrap();
    assert_eq!(reloaded.profile.bio, "Planner");
  }

  #[tokio::test]
  async fn test_update_preferences() {
    let (_, mut profiles) = store(true);
    let prefs = Preferences {
      theme: Theme::Dark,
      language: Language::En,
      notifications: false,
    };

    let updated = profiles.update_preferences(prefs.clone()).await.into_data().unwrap();
    assert_eq!(updated.profile.preferences, prefs);
    assert_eq!(profiles.profile().unwrap().profile.preferences, prefs);
  }
}
