// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim session persistence over the key-value store.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use ring::rand::{SecureRandom, SystemRandom};

use super::{ClaimSession, SessionError};
use crate::storage::{keys, KvStore, Mutation, StorageError};

/// Default claim session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

const TOKEN_BYTES: usize = 32;

/// Claim sessions keyed by `preclaim:session:<token>`.
#[derive(Clone)]
pub struct ClaimSessionStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    rng: SystemRandom,
}

impl ClaimSessionStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_SESSION_TTL,
            rng: SystemRandom::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Store a new session under a fresh random token and return the token.
    pub fn create(&self, session: &ClaimSession) -> Result<String, SessionError> {
        // A collision on 256 random bits would mean a broken RNG
        let token = self.generate_token()?;
        let inserted = self
            .store
            .insert_json(&keys::preclaim_session(&token), session, Some(self.ttl))?;
        if !inserted {
            return Err(SessionError::Random);
        }

        tracing::debug!(gift_id = session.gift_id, "Claim session created");
        Ok(token)
    }

    /// Read a live session.
    pub fn get(&self, token: &str) -> Result<Option<ClaimSession>, SessionError> {
        Ok(self.store.get_json(&keys::preclaim_session(token))?)
    }

    /// Write a session, replacing any previous value and TTL.
    pub fn put(
        &self,
        token: &str,
        session: &ClaimSession,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        self.store
            .put_json(&keys::preclaim_session(token), session, Some(ttl))?;
        Ok(())
    }

    /// Atomically apply `mutator` to a live session.
    ///
    /// The mutator runs inside the store's read-modify-write primitive, so
    /// concurrent updates to one token are serialized. If it fails, nothing
    /// is written and its error is returned. The remaining TTL is preserved.
    pub fn update<F>(&self, token: &str, mut mutator: F) -> Result<ClaimSession, SessionError>
    where
        F: FnMut(&mut ClaimSession) -> Result<(), SessionError>,
    {
        let mut rejected: Option<SessionError> = None;
        let updated = self
            .store
            .update(&keys::preclaim_session(token), &mut |current| {
                let before: ClaimSession = serde_json::from_slice(current)?;
                let mut after = before.clone();
                match mutator(&mut after) {
                    Ok(()) if after == before => Ok(Mutation::Keep),
                    Ok(()) => Ok(Mutation::Replace(serde_json::to_vec(&after)?)),
                    Err(e) => {
                        rejected = Some(e);
                        Ok(Mutation::Keep)
                    }
                }
            })?;

        if let Some(err) = rejected {
            return Err(err);
        }
        let bytes = updated.ok_or(SessionError::NotFound)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::Storage(StorageError::Serde(e)))
    }

    /// Promote the session's claimer to `claimer`, or confirm it is already bound to it.
    pub fn bind_claimer(
        &self,
        token: &str,
        claimer: Address,
    ) -> Result<ClaimSession, SessionError> {
        self.update(token, |session| session.bind_claimer(claimer).map(|_| ()))
    }

    fn generate_token(&self) -> Result<String, SessionError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng.fill(&mut bytes).map_err(|_| SessionError::Random)?;
        Ok(alloy::hex::encode(bytes))
    }
}
