// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in signature verification.
//!
//! The challenge is rebuilt from the stored record, the signer is recovered
//! from the signature over it, and only then is the nonce consumed with an
//! atomic `take`. Two concurrent verifications of the same nonce can both get
//! past the read, but only one wins the take; the other sees
//! `NonceExpiredOrUsed`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::challenge::SiweSettings;
use super::jwt::{Credential, JwtIssuer};
use super::siwe::{normalize_domain, parse_address, recover_signer, SiweMessage};
use super::AuthError;
use crate::storage::{keys, KvStore};

#[derive(Clone)]
pub struct SignatureVerifier {
    store: Arc<dyn KvStore>,
    settings: Arc<SiweSettings>,
    jwt: Arc<JwtIssuer>,
}

impl SignatureVerifier {
    pub fn new(store: Arc<dyn KvStore>, settings: Arc<SiweSettings>, jwt: Arc<JwtIssuer>) -> Self {
        Self {
            store,
            settings,
            jwt,
        }
    }

    /// Verify a signed challenge and mint a credential.
    pub fn verify(
        &self,
        address: &str,
        signature: &str,
        nonce: &str,
        chain_id: u64,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<Credential, AuthError> {
        let address = parse_address(address)?;
        let key = keys::siwe_nonce(nonce.trim());

        let challenge: SiweMessage = self
            .store
            .get_json(&key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .ok_or(AuthError::NonceExpiredOrUsed)?;

        if challenge.is_expired(now) {
            // The store TTL normally hides these already
            let _ = self.store.delete(&key);
            return Err(AuthError::NonceExpiredOrUsed);
        }

        let domain = normalize_domain(domain);
        if domain != challenge.domain || !self.settings.is_domain_allowed(&domain) {
            tracing::warn!(
                expected = %challenge.domain,
                got = %domain,
                "SIWE domain mismatch"
            );
            return Err(AuthError::DomainMismatch);
        }
        if chain_id != challenge.chain_id {
            return Err(AuthError::ChainMismatch);
        }
        if address != challenge.address {
            return Err(AuthError::AddressMismatch);
        }

        let recovered = recover_signer(&challenge.to_string(), signature)?;
        if recovered != address {
            tracing::warn!(
                address = %address,
                recovered = %recovered,
                "SIWE signature from a different account"
            );
            return Err(AuthError::AddressMismatch);
        }

        let consumed = self
            .store
            .take(&key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        if consumed.is_none() {
            tracing::warn!(address = %address, "Lost nonce race, rejecting replay");
            return Err(AuthError::NonceExpiredOrUsed);
        }

        let credential = self.jwt.issue(address, now)?;
        tracing::info!(
            address = %address,
            expires_at = %credential.expires_at,
            "Wallet signed in"
        );
        Ok(credential)
    }
}
