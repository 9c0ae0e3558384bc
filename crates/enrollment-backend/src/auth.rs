//! Password authentication against the hosted auth service.
//!
//! The client keeps the current session in a [`SessionStore`] and publishes
//! every change on a `watch` channel so front ends can react to sign-in and
//! sign-out without polling.

use std::sync::{Mutex, MutexGuard};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::session::{AuthUser, Session, SessionStore, mask_token, session_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutScope {
    Global,
    Local,
}

impl SignOutScope {
    fn as_str(self) -> &'static str {
        match self {
            SignOutScope::Global => "global",
            SignOutScope::Local => "local",
        }
    }
}

/// What the service returned for a sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The address must be confirmed before signing in.
    ConfirmationSent(AuthUser),
    /// Auto-confirmed projects hand back a session immediately.
    SignedIn(Session),
}

#[derive(Debug)]
pub struct AuthClient {
    http: reqwest::Client,
    config: BackendConfig,
    key: String,
    store: Mutex<SessionStore>,
    changes: watch::Sender<Option<Session>>,
}

impl AuthClient {
    pub fn new(config: BackendConfig, store: SessionStore) -> Result<Self> {
        Self::with_http(reqwest::Client::new(), config, store)
    }

    pub fn with_http(
        http: reqwest::Client,
        config: BackendConfig,
        store: SessionStore,
    ) -> Result<Self> {
        let key = session_key(&config.project_ref());
        let initial = store.load_session(&key)?;
        let (changes, _) = watch::channel(initial);
        Ok(Self {
            http,
            config,
            key,
            store: Mutex::new(store),
            changes,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Receiver that observes every session change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.changes.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.changes.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.changes
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    /// Removes every stored auth key, dropping the current session locally.
    pub fn clear_auth_state(&self) -> Result<usize> {
        let removed = self.store()?.clear_auth_state()?;
        self.publish(None);
        Ok(removed)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        debug!(email, "signing in with password");
        let response = self
            .anonymous(self.http.post(self.config.auth_url("token")))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: Session = parse_success(response).await?;
        self.remember(session.clone())?;
        info!(
            user_id = %session.user.id,
            token_preview = %mask_token(&session.access_token),
            "signed in"
        );
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUpOutcome> {
        debug!(email, redirect_to, "signing up");
        let response = self
            .anonymous(self.http.post(self.config.auth_url("signup")))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: Value = parse_success(response).await?;

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            self.remember(session.clone())?;
            info!(user_id = %session.user.id, "signed up and signed in");
            return Ok(SignUpOutcome::SignedIn(session));
        }

        let user: AuthUser = match body.get("user") {
            Some(user) => serde_json::from_value(user.clone())?,
            None => serde_json::from_value(body)?,
        };
        info!(user_id = %user.id, "sign-up confirmation sent");
        Ok(SignUpOutcome::ConfirmationSent(user))
    }

    /// Revokes the session remotely and always forgets it locally.
    pub async fn sign_out(&self, scope: SignOutScope) -> Result<()> {
        let Some(token) = self.access_token() else {
            debug!("sign-out without a session");
            self.forget()?;
            return Ok(());
        };

        let result = self
            .authorized(self.http.post(self.config.auth_url("logout")), &token)
            .query(&[("scope", scope.as_str())])
            .send()
            .await;
        self.forget()?;

        let response = result?;
        let status = response.status();
        if status.is_success() || matches!(status, StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND) {
            info!(scope = scope.as_str(), "signed out");
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }

    /// Looks up the user behind the stored session.
    ///
    /// A missing or rejected session yields `Ok(None)`; callers treat that as
    /// a redirect to sign-in.
    pub async fn current_user(&self) -> Result<Option<AuthUser>> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };
        let response = self
            .authorized(self.http.get(self.config.auth_url("user")), &token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("stored session was rejected");
                self.forget()?;
                Ok(None)
            }
            _ => parse_success(response).await.map(Some),
        }
    }

    pub async fn require_user(&self) -> Result<AuthUser> {
        self.current_user()
            .await?
            .ok_or(BackendError::NotAuthenticated)
    }

    fn anonymous(&self, request: RequestBuilder) -> RequestBuilder {
        self.authorized(request, &self.config.anon_key)
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    fn store(&self) -> Result<MutexGuard<'_, SessionStore>> {
        self.store
            .lock()
            .map_err(|err| BackendError::Storage(format!("lock poisoned: {err}")))
    }

    fn remember(&self, session: Session) -> Result<()> {
        self.store()?.save_session(&self.key, &session)?;
        self.publish(Some(session));
        Ok(())
    }

    fn forget(&self) -> Result<()> {
        self.store()?.remove(&self.key)?;
        self.publish(None);
        Ok(())
    }

    fn publish(&self, session: Option<Session>) {
        self.changes.send_replace(session);
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

pub(crate) async fn parse_success<T>(response: Response) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    Ok(response.json().await?)
}

pub(crate) async fn error_from(response: Response) -> BackendError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            } else {
                text
            }
        });
    warn!(status = %status, message = %message, "backend request failed");
    BackendError::api(status.as_u16(), message)
}
