use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BackendError, Result};

/// Key patterns owned by the hosted auth client.
const AUTH_KEY_PATTERNS: [&str; 2] = ["supabase.auth.*", "*sb-*"];

static AUTH_KEYS: LazyLock<GlobSet> = LazyLock::new(|| {
    let mut builder = GlobSetBuilder::new();
    for pattern in AUTH_KEY_PATTERNS {
        builder.add(Glob::new(pattern).expect("auth key pattern is a valid glob"));
    }
    builder.build().expect("auth key globs compile")
});

pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        "*".repeat(token.chars().count())
    } else {
        format!("{visible}****")
    }
}

/// Storage key holding the serialized session for a project.
pub fn session_key(project_ref: &str) -> String {
    format!("sb-{project_ref}-auth-token")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &mask_token(&self.access_token))
            .field("refresh_token", &mask_token(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// String key/value store standing in for browser local storage.
///
/// When opened from a path every mutation is written back as a JSON object.
#[derive(Debug, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
    entries: BTreeMap<String, String>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|err| storage_error(&path, err))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.entries.insert(key.into(), value.into());
        self.persist()
    }

    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn load_session(&self, key: &str) -> Result<Option<Session>> {
        self.get(key)
            .map(serde_json::from_str)
            .transpose()
            .map_err(BackendError::from)
    }

    pub fn save_session(&mut self, key: &str, session: &Session) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        self.set(key, raw)
    }

    /// Drops every auth-owned key so a fresh sign-in starts from nothing.
    ///
    /// Returns how many keys were removed.
    pub fn clear_auth_state(&mut self) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !AUTH_KEYS.is_match(key));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "cleared stored auth state");
            self.persist()?;
        }
        Ok(removed)
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| storage_error(path, err))?;
        }
        let raw = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, raw).map_err(|err| storage_error(path, err))
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> BackendError {
    BackendError::Storage(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "eyJhbGciOi.access".into(),
            refresh_token: "refresh-1".into(),
            token_type: Some("bearer".into()),
            expires_at: Some(1_900_000_000),
            user: AuthUser {
                id: "user-1".into(),
                email: Some("anne@example.com".into()),
            },
        }
    }

    #[test]
    fn clear_auth_state_removes_only_auth_keys() {
        let mut store = SessionStore::in_memory();
        store.set("supabase.auth.token", "legacy").unwrap();
        store.set("sb-abcd-auth-token", "{}").unwrap();
        store.set("prefix-sb-other", "x").unwrap();
        store.set("theme", "dark").unwrap();
        store.set("supabase.settings", "keep").unwrap();

        assert_eq!(store.clear_auth_state().unwrap(), 3);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["supabase.settings", "theme"]);
        assert_eq!(store.clear_auth_state().unwrap(), 0);
    }

    #[test]
    fn file_store_persists_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let key = session_key("abcd");

        let mut store = SessionStore::open(&path).unwrap();
        store.save_session(&key, &session()).unwrap();

        let reopened = SessionStore::open(&path).unwrap();
        assert_eq!(reopened.load_session(&key).unwrap(), Some(session()));

        let mut reopened = reopened;
        reopened.clear_auth_state().unwrap();
        let cleared = SessionStore::open(&path).unwrap();
        assert_eq!(cleared.load_session(&key).unwrap(), None);
    }

    #[test]
    fn session_debug_masks_tokens() {
        let rendered = format!("{:?}", session());
        assert!(rendered.contains("eyJh****"));
        assert!(!rendered.contains("eyJhbGciOi.access"));
        assert_eq!(mask_token("abc"), "***");
    }
}
