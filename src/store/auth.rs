//! Sign-up, sign-in and session lifecycle on either path.

use chrono::Utc;
use sha2::{Digest, Sha256};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::fallback::{with_fallback, Outcome};
use super::password::PasswordHasher;
use super::session::{AuthCapability, SessionState};
use super::token;
use crate::error::StoreError;
use crate::local::LocalCollectionStore;
use crate::remote::api_types::{
  AuthResponse, ChangePasswordBody, RegisterBody, UserResponse,
  CHANGE_PASSWORD_PATH, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REGISTER_PATH,
};
use crate::remote::{RemoteGateway, RemoteRequest};
use crate::result::ApiResult;
use crate::types::{
  Credentials, LocalAccount, PasswordChange, ProfileDetails, Registration, Session, UserProfile,
};

/// Local accounts, shared by everyone using this store.
pub const USERS_KEY: &str = "users";

/// Id given to an account created without the service.
pub fn local_user_id(email: &str) -> String {
  let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
  format!("local-{}", &hex::encode(digest)[..12])
}

pub struct AuthStore {
  gateway: Option<Arc<RemoteGateway>>,
  local: LocalCollectionStore,
  session: Arc<SessionState>,
  hasher: Arc<dyn PasswordHasher>,
}

impl AuthStore {
  pub fn new(
    gateway: Option<Arc<RemoteGateway>>,
    local: LocalCollectionStore,
    session: Arc<SessionState>,
    hasher: Arc<dyn PasswordHasher>,
  ) -> Self {
    Self {
      gateway,
      local,
      session,
      hasher,
    }
  }

  pub fn session(&self) -> &Arc<SessionState> {
    &self.session
  }

  pub fn is_authenticated(&self) -> bool {
    self.session.is_authenticated()
  }

  /// Create an account and sign in with it.
  pub async fn register(&self, registration: &Registration) -> ApiResult<Session> {
    ApiResult::from(self.register_inner(registration).await)
  }

  pub async fn login(&self, credentials: &Credentials) -> ApiResult<Session> {
    ApiResult::from(self.login_inner(credentials).await)
  }

  /// Tell the service (best effort) and drop the session either way.
  pub async fn logout(&self) -> ApiResult<()> {
    if let (Some(gateway), Some(token)) = (&self.gateway, self.session.current_credential()) {
      let result = gateway
        .mutate_resource(RemoteRequest::post(LOGOUT_PATH).bearer(token))
        .await;
      if let Some(error) = result.error() {
        debug!("remote logout failed: {}", error);
      }
    }
    ApiResult::from(self.session.clear())
  }

  /// The signed-in user, refreshed from the service when possible.
  pub async fn current_user(&self) -> ApiResult<UserProfile> {
    ApiResult::from(self.current_user_inner().await)
  }

  pub async fn change_password(&self, change: &PasswordChange) -> ApiResult<()> {
    ApiResult::from(self.change_password_inner(change).await)
  }

  /// Whether the remote token is within an hour of expiring.
  pub fn is_token_expiring_soon(&self) -> bool {
    self
      .session
      .session()
      .and_then(|s| s.token)
      .is_some_and(|t| token::is_expiring_soon(&t, Utc::now()))
  }

  /// Re-validate a session whose token is about to expire.
  ///
  /// Only the remote path can vouch for a token, so there is no local
  /// fallback: if the service does not confirm the user the session ends.
  /// Returns whether a session is still in place.
  pub async fn refresh_if_needed(&self) -> bool {
    if !self.is_token_expiring_soon() {
      return true;
    }

    let confirmed = match (&self.gateway, self.session.session().and_then(|s| s.token)) {
      (Some(gateway), Some(token)) => gateway
        .fetch_typed::<UserResponse>(RemoteRequest::get(ME_PATH).bearer(token))
        .await
        .into_data(),
      _ => None,
    };

    match confirmed {
      Some(response) => match self.session.replace_user(response.user) {
        Ok(()) => true,
        Err(e) => {
          warn!("failed to store refreshed user: {}", e);
          true
        }
      },
      None => {
        info!("session could not be refreshed, signing out");
        if let Err(e) = self.session.clear() {
          warn!("failed to clear session: {}", e);
        }
        false
      }
    }
  }

  async fn register_inner(&self, registration: &Registration) -> Result<Session, StoreError> {
    validate_registration(registration)?;

    let remote = self.gateway.as_ref().map(|gateway| async move {
      let body = RegisterBody::from(registration);
      gateway
        .mutate_json::<_, AuthResponse>(RemoteRequest::post(REGISTER_PATH), &body)
        .await
    });
    let outcome = with_fallback("register", remote, || self.register_local(registration)).await?;

    self.start(outcome)
  }

  async fn login_inner(&self, credentials: &Credentials) -> Result<Session, StoreError> {
    let remote = self.gateway.as_ref().map(|gateway| {
      gateway.mutate_json::<_, AuthResponse>(RemoteRequest::post(LOGIN_PATH), credentials)
    });
    let outcome = with_fallback("login", remote, || self.login_local(credentials)).await?;

    self.start(outcome)
  }

  async fn current_user_inner(&self) -> Result<UserProfile, StoreError> {
    let remote = self.remote_token().map(|(gateway, token)| async move {
      gateway
        .fetch_typed::<UserResponse>(RemoteRequest::get(ME_PATH).bearer(token))
        .await
    });
    let outcome = with_fallback("current user", remote, || {
      self.session.current_user().ok_or(StoreError::NotAuthenticated)
    })
    .await?;

    match outcome {
      Outcome::Remote(response) => {
        self.session.replace_user(response.user.clone())?;
        Ok(response.user)
      }
      Outcome::Local(user) => Ok(user),
    }
  }

  async fn change_password_inner(&self, change: &PasswordChange) -> Result<(), StoreError> {
    if change.new_password.is_empty() {
      return Err(StoreError::Validation("new password is required".to_string()));
    }

    let remote = self.remote_token().map(|(gateway, token)| async move {
      gateway
        .mutate_json::<_, Value>(
          RemoteRequest::post(CHANGE_PASSWORD_PATH).bearer(token),
          &ChangePasswordBody::from(change),
        )
        .await
    });
    with_fallback("change password", remote, || self.change_password_local(change)).await?;
    Ok(())
  }

  fn remote_token(&self) -> Option<(Arc<RemoteGateway>, String)> {
    let gateway = self.gateway.clone()?;
    let token = self.session.current_credential()?;
    Some((gateway, token))
  }

  fn start(&self, outcome: Outcome<AuthResponse, Session>) -> Result<Session, StoreError> {
    let session = match outcome {
      Outcome::Remote(response) => {
        if let Some(message) = &response.message {
          debug!("{}", message);
        }
        Session::remote(response.token, response.user, Utc::now())
      }
      Outcome::Local(session) => session,
    };
    self.session.start(session.clone())?;
    info!(user = %session.user.id, origin = ?session.origin, "signed in");
    Ok(session)
  }

  fn accounts(&self) -> Result<Vec<LocalAccount>, StoreError> {
    self.local.read_collection(USERS_KEY)
  }

  fn register_local(&self, registration: &Registration) -> Result<Session, StoreError> {
    let mut accounts = self.accounts()?;
    let email = registration.email.trim().to_lowercase();
    if accounts
      .iter()
      .any(|a| a.user.email.eq_ignore_ascii_case(&email))
    {
      return Err(StoreError::Conflict(
        "a user with this email already exists".to_string(),
      ));
    }

    let now = Utc::now();
    let user = UserProfile {
      id: local_user_id(&email),
      name: registration.name.trim().to_string(),
      email,
      profile: ProfileDetails::default(),
      created_at: Some(now),
      updated_at: Some(now),
      last_login: Some(now),
    };
    accounts.push(LocalAccount {
      user: user.clone(),
      password_hash: self.hasher.hash(&registration.password),
    });
    self.local.write_collection(USERS_KEY, &accounts)?;

    Ok(Session::local(user, now))
  }

  fn login_local(&self, credentials: &Credentials) -> Result<Session, StoreError> {
    let mut accounts = self.accounts()?;
    let account = accounts
      .iter_mut()
      .find(|a| a.user.email.eq_ignore_ascii_case(credentials.email.trim()))
      .filter(|a| self.hasher.verify(&credentials.password, &a.password_hash))
      .ok_or(StoreError::InvalidCredentials)?;

    let now = Utc::now();
    account.user.last_login = Some(now);
    let user = account.user.clone();
    self.local.write_collection(USERS_KEY, &accounts)?;

    Ok(Session::local(user, now))
  }

  fn change_password_local(&self, change: &PasswordChange) -> Result<(), StoreError> {
    let user_id = self
      .session
      .current_identity()
      .ok_or(StoreError::NotAuthenticated)?;
    let mut accounts = self.accounts()?;
    let account = accounts
      .iter_mut()
      .find(|a| a.user.id == user_id)
      .ok_or_else(|| StoreError::NotFound(format!("local account {}", user_id)))?;

    if !self
      .hasher
      .verify(&change.current_password, &account.password_hash)
    {
      return Err(StoreError::InvalidCredentials);
    }

    account.password_hash = self.hasher.hash(&change.new_password);
    account.user.updated_at = Some(Utc::now());
    self.local.write_collection(USERS_KEY, &accounts)
  }
}

fn validate_registration(registration: &Registration) -> Result<(), StoreError> {
  if registration.name.trim().is_empty() {
    return Err(StoreError::Validation("name is required".to_string()));
  }
  if !registration.email.contains('@') {
    return Err(StoreError::Validation("a valid email is required".to_string()));
  }
  if registration.password.is_empty() {
    return Err(StoreError::Validation("password is required".to_string()));
  }
  Ok(())
}
