// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use alloy::primitives::Address;

use crate::approval::ApprovalService;
use crate::auth::challenge::DEFAULT_CHALLENGE_TTL;
use crate::auth::{ChallengeIssuer, JwtIssuer, SignatureVerifier, SiweSettings};
use crate::blockchain::{ChainClient, ChainClientError};
use crate::config::AppConfig;
use crate::rate_limit::FixedWindowLimiter;
use crate::session::ClaimSessionStore;
use crate::storage::KvStore;

/// Reads gift mints from the chain.
pub struct MintReader {
    pub client: ChainClient,
    pub nft_contract: Address,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub jwt: Arc<JwtIssuer>,
    pub challenges: ChallengeIssuer,
    pub verifier: SignatureVerifier,
    pub sessions: ClaimSessionStore,
    pub approvals: Arc<ApprovalService>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub mints: Option<Arc<MintReader>>,
}

impl AppState {
    /// Wire every service over `store` from a loaded configuration.
    pub fn new(store: Arc<dyn KvStore>, config: &AppConfig) -> Result<Self, ChainClientError> {
        let settings = Arc::new(SiweSettings {
            allowed_domains: config.allowed_domains.clone(),
            statement: config.statement.clone(),
            supported_chains: config.supported_chains.clone(),
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
        });
        let jwt = Arc::new(JwtIssuer::new(&config.jwt_secret, config.jwt_ttl));
        let sessions = ClaimSessionStore::new(store.clone());

        let mints = match &config.chain {
            Some(chain) => Some(Arc::new(MintReader {
                client: ChainClient::new(&chain.rpc_url, chain.chain_id)?,
                nft_contract: chain.nft_contract,
            })),
            None => None,
        };

        Ok(Self {
            challenges: ChallengeIssuer::new(store.clone(), settings.clone()),
            verifier: SignatureVerifier::new(store.clone(), settings, jwt.clone()),
            approvals: Arc::new(ApprovalService::new(
                store.clone(),
                sessions.clone(),
                config.approver.clone(),
            )),
            limiter: Arc::new(FixedWindowLimiter::new(
                config.rate_limit_max,
                config.rate_limit_window,
            )),
            store,
            jwt,
            sessions,
            mints,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::approval::service::tests::approver_config;
    use crate::config::{
        APPROVAL_GATE_ADDRESS_ENV, APPROVER_ADDRESS_ENV, APPROVER_PRIVATE_KEY_ENV,
        JWT_SECRET_ENV, SIWE_ALLOWED_DOMAINS_ENV,
    };
    use crate::storage::MemoryStore;

    pub(crate) fn test_config() -> AppConfig {
        let approver = approver_config();
        let expected = approver.expected_address.to_checksum(None);
        let gate = approver.gate_address.to_checksum(None);
        let vars = [
            (JWT_SECRET_ENV, "0123456789abcdef0123456789abcdef".to_string()),
            (SIWE_ALLOWED_DOMAINS_ENV, "example.com".to_string()),
            (
                APPROVER_PRIVATE_KEY_ENV,
                crate::approval::service::tests::APPROVER_KEY.to_string(),
            ),
            (APPROVER_ADDRESS_ENV, expected),
            (APPROVAL_GATE_ADDRESS_ENV, gate),
        ];
        AppConfig::from_lookup(|name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    pub(crate) fn test_state() -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), &test_config()).unwrap()
    }

    #[test]
    fn wires_approver_from_config() {
        let state = test_state();
        assert!(state.approvals.check_approver().is_ok());
        assert!(state.mints.is_none());
    }
}
