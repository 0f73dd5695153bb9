// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side credential cache.
//!
//! Owned by the caller (a CLI, a test harness, another service calling this
//! one) and passed where needed. Optionally persisted as JSON in the same
//! shape browser clients keep in local storage:
//!
//! ```json
//! { "isAuthenticated": true, "address": "0x..", "token": "..", "expiresAt": ".." }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::jwt::Credential;
use super::AuthError;

/// Persisted cache failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionCacheError {
    #[error("credential cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential cache is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedAuth {
    is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct SessionManager {
    current: RwLock<Option<Credential>>,
    path: Option<PathBuf>,
}

impl SessionManager {
    /// An in-memory manager with no credential.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manager backed by `path`. A missing file starts unauthenticated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionCacheError> {
        let path = path.as_ref().to_path_buf();
        let current = match std::fs::read(&path) {
            Ok(bytes) => {
                let persisted: PersistedAuth = serde_json::from_slice(&bytes)?;
                match persisted {
                    PersistedAuth {
                        is_authenticated: true,
                        address: Some(address),
                        token: Some(token),
                        expires_at: Some(expires_at),
                    } => Some(Credential {
                        token,
                        address,
                        // Not persisted; only the expiry matters client-side
                        issued_at: expires_at,
                        expires_at,
                    }),
                    _ => None,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            current: RwLock::new(current),
            path: Some(path),
        })
    }

    /// The current credential, if still valid at `now`.
    ///
    /// A stale credential is cleared as a side effect.
    pub fn get(&self, now: DateTime<Utc>) -> Option<Credential> {
        let current = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match current {
            Some(credential) if credential.is_valid(now) => Some(credential),
            Some(_) => {
                tracing::debug!("Cached credential expired, clearing");
                if let Err(e) = self.clear() {
                    tracing::warn!(error = %e, "Failed to clear expired credential");
                }
                None
            }
            None => None,
        }
    }

    pub fn set(&self, credential: Credential) -> Result<(), SessionCacheError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(credential);
        self.persist()
    }

    pub fn clear(&self) -> Result<(), SessionCacheError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.persist()
    }

    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        self.get(now).is_some()
    }

    /// `Authorization` header value for a protected call.
    pub fn authorization_header(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        self.get(now)
            .map(|c| format!("Bearer {}", c.token))
            .ok_or(AuthError::ReauthenticationRequired)
    }

    /// Write the current state to the backing file, if any.
    pub fn persist(&self) -> Result<(), SessionCacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let current = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let persisted = match current {
            Some(c) => PersistedAuth {
                is_authenticated: true,
                address: Some(c.address),
                token: Some(c.token),
                expires_at: Some(c.expires_at),
            },
            None => PersistedAuth {
                is_authenticated: false,
                address: None,
                token: None,
                expires_at: None,
            },
        };
        std::fs::write(path, serde_json::to_vec_pretty(&persisted)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn credential(expires_at: DateTime<Utc>) -> Credential {
        Credential {
            token: "header.payload.sig".to_string(),
            address: Address::repeat_byte(0x33),
            issued_at: expires_at - Duration::hours(24),
            expires_at,
        }
    }

    #[test]
    fn set_get_clear() {
        let now = Utc::now();
        let manager = SessionManager::new();
        assert!(!manager.is_authenticated(now));

        manager.set(credential(now + Duration::hours(1))).unwrap();
        assert_eq!(
            manager.authorization_header(now).unwrap(),
            "Bearer header.payload.sig"
        );

        manager.clear().unwrap();
        assert!(matches!(
            manager.authorization_header(now),
            Err(AuthError::ReauthenticationRequired)
        ));
    }

    #[test]
    fn stale_credential_is_dropped_inside_buffer() {
        let now = Utc::now();
        let manager = SessionManager::new();
        manager.set(credential(now + Duration::minutes(3))).unwrap();

        assert!(manager.get(now).is_none());
        // Cleared, not just hidden
        assert!(manager.get(now - Duration::hours(1)).is_none());
    }

    #[test]
    fn persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.json");
        let now = Utc::now();

        let manager = SessionManager::load(&path).unwrap();
        assert!(!manager.is_authenticated(now));
        manager.set(credential(now + Duration::hours(2))).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["isAuthenticated"], true);
        assert!(raw["expiresAt"].is_string());

        let reloaded = SessionManager::load(&path).unwrap();
        assert_eq!(
            reloaded.get(now).map(|c| c.address),
            Some(Address::repeat_byte(0x33))
        );

        reloaded.clear().unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["isAuthenticated"], false);
    }
}
