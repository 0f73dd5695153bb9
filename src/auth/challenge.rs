// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in challenge issuance.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use ring::rand::SystemRandom;
use serde::Serialize;

use super::siwe::{generate_nonce, normalize_domain, parse_address, SiweMessage};
use super::AuthError;
use crate::storage::{keys, KvStore};

/// How long an issued challenge stays usable.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(10 * 60);

/// Attempts at finding an unused nonce before giving up.
const NONCE_ATTEMPTS: usize = 3;

/// Sign-in policy shared by the issuer and the verifier.
#[derive(Debug, Clone)]
pub struct SiweSettings {
    /// Normalized domains a challenge may be bound to
    pub allowed_domains: Vec<String>,
    pub statement: String,
    pub supported_chains: Vec<u64>,
    pub challenge_ttl: Duration,
}

impl SiweSettings {
    pub fn is_domain_allowed(&self, domain: &str) -> bool {
        self.allowed_domains.iter().any(|d| d == domain)
    }

    pub fn is_chain_supported(&self, chain_id: u64) -> bool {
        chain_id > 0 && self.supported_chains.contains(&chain_id)
    }
}

/// An issued challenge.
#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub address: Address,
    pub nonce: String,
    pub domain: String,
    pub chain_id: u64,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues nonce-bound SIWE challenges and records them for verification.
#[derive(Clone)]
pub struct ChallengeIssuer {
    store: Arc<dyn KvStore>,
    settings: Arc<SiweSettings>,
    rng: SystemRandom,
}

impl ChallengeIssuer {
    pub fn new(store: Arc<dyn KvStore>, settings: Arc<SiweSettings>) -> Self {
        Self {
            store,
            settings,
            rng: SystemRandom::new(),
        }
    }

    /// Issue a challenge for `address` on `chain_id`, scoped to `domain`.
    pub fn issue_challenge(
        &self,
        address: &str,
        chain_id: u64,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<Challenge, AuthError> {
        let address = parse_address(address)?;
        if !self.settings.is_chain_supported(chain_id) {
            return Err(AuthError::UnsupportedChain(chain_id));
        }
        let domain = normalize_domain(domain);
        if !self.settings.is_domain_allowed(&domain) {
            tracing::warn!(domain = %domain, "Challenge requested for unserved domain");
            return Err(AuthError::DomainMismatch);
        }

        let ttl = chrono::Duration::from_std(self.settings.challenge_ttl)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        for _ in 0..NONCE_ATTEMPTS {
            let nonce = generate_nonce(&self.rng)?;
            let message = SiweMessage {
                domain: domain.clone(),
                address,
                statement: self.settings.statement.clone(),
                uri: format!("https://{domain}"),
                chain_id,
                nonce: nonce.clone(),
                issued_at: now,
                expiration_time: now + ttl,
            };

            let inserted = self
                .store
                .insert_json(
                    &keys::siwe_nonce(&nonce),
                    &message,
                    Some(self.settings.challenge_ttl),
                )
                .map_err(|e| AuthError::InternalError(e.to_string()))?;
            if !inserted {
                tracing::warn!("Nonce collision, regenerating");
                continue;
            }

            tracing::info!(address = %address, chain_id, domain = %domain, "Challenge issued");
            return Ok(Challenge {
                address,
                nonce,
                domain,
                chain_id,
                message: message.to_string(),
                issued_at: message.issued_at,
                expires_at: message.expiration_time,
            });
        }

        Err(AuthError::InternalError(
            "could not allocate a unique nonce".to_string(),
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    pub(crate) fn settings() -> Arc<SiweSettings> {
        Arc::new(SiweSettings {
            allowed_domains: vec!["example.com".to_string()],
            statement: "Sign in to claim your gift.".to_string(),
            supported_chains: vec![8453, 84532],
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
        })
    }

    const ADDR: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn issues_and_persists_challenge() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let issuer = ChallengeIssuer::new(store.clone(), settings());
        let now = Utc::now();

        let challenge = issuer
            .issue_challenge(ADDR, 8453, "https://example.com", now)
            .unwrap();
        assert_eq!(challenge.domain, "example.com");
        assert_eq!(challenge.expires_at - now, chrono::Duration::minutes(10));
        assert!(challenge.message.contains(&format!("Nonce: {}", challenge.nonce)));
        assert!(challenge.message.contains("Chain ID: 8453"));

        let stored: SiweMessage = store
            .get_json(&keys::siwe_nonce(&challenge.nonce))
            .unwrap()
            .unwrap();
        assert_eq!(stored.to_string(), challenge.message);
    }

    #[test]
    fn nonces_are_unique_per_challenge() {
        let issuer = ChallengeIssuer::new(Arc::new(MemoryStore::new()), settings());
        let now = Utc::now();
        let a = issuer.issue_challenge(ADDR, 8453, "example.com", now).unwrap();
        let b = issuer.issue_challenge(ADDR, 8453, "example.com", now).unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn rejects_bad_input() {
        let issuer = ChallengeIssuer::new(Arc::new(MemoryStore::new()), settings());
        let now = Utc::now();

        assert!(matches!(
            issuer.issue_challenge("0xnope", 8453, "example.com", now),
            Err(AuthError::InvalidAddress(_))
        ));
        assert!(matches!(
            issuer.issue_challenge(ADDR, 1, "example.com", now),
            Err(AuthError::UnsupportedChain(1))
        ));
        assert!(matches!(
            issuer.issue_challenge(ADDR, 0, "example.com", now),
            Err(AuthError::UnsupportedChain(0))
        ));
        assert!(matches!(
            issuer.issue_challenge(ADDR, 8453, "evil.example", now),
            Err(AuthError::DomainMismatch)
        ));
    }
}
