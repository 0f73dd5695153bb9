// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Claim Sessions
//!
//! Server-side state for a password/education-gated claim, addressed by an
//! opaque random token rather than the claimer's address.
//!
//! The claimer starts [`ClaimerState::Unbound`] (the wallet may connect after
//! the password check) and is promoted to `Bound(address)` exactly once.
//! A session bound to one address can never be rebound to another.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::TokenId;
use crate::storage::StorageError;

pub mod password;
pub mod store;

pub use store::ClaimSessionStore;

/// Who the session is claimed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "address", rename_all = "snake_case")]
pub enum ClaimerState {
    /// Wallet not connected yet
    Unbound,
    Bound(Address),
}

impl ClaimerState {
    pub fn address(&self) -> Option<Address> {
        match self {
            ClaimerState::Unbound => None,
            ClaimerState::Bound(addr) => Some(*addr),
        }
    }
}

/// A claim in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSession {
    pub token_id: TokenId,
    pub gift_id: u64,
    pub claimer: ClaimerState,
    pub password_validated: bool,
    pub requires_education: bool,
    pub created_at: DateTime<Utc>,
}

impl ClaimSession {
    /// Bind the session to `claimer`.
    ///
    /// Returns `true` when this call performed the promotion and `false` when
    /// the session was already bound to the same address.
    pub fn bind_claimer(&mut self, claimer: Address) -> Result<bool, SessionError> {
        match self.claimer {
            ClaimerState::Unbound => {
                self.claimer = ClaimerState::Bound(claimer);
                Ok(true)
            }
            ClaimerState::Bound(bound) if bound == claimer => Ok(false),
            ClaimerState::Bound(bound) => Err(SessionError::IdentityMismatch {
                bound,
                requested: claimer,
            }),
        }
    }

    /// Whether the session belongs to the given gift/token pair.
    pub fn matches(&self, gift_id: u64, token_id: TokenId) -> bool {
        self.gift_id == gift_id && self.token_id == token_id
    }
}

/// Claim session failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Claim session not found or expired")]
    NotFound,

    #[error("Session is bound to {bound}, not {requested}")]
    IdentityMismatch { bound: Address, requested: Address },

    #[error("Failed to generate session token")]
    Random,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{validate, TokenIdSource};

    pub(crate) fn sample_session() -> ClaimSession {
        ClaimSession {
            token_id: validate(42u64, TokenIdSource::UserInput).unwrap(),
            gift_id: 7,
            claimer: ClaimerState::Unbound,
            password_validated: true,
            requires_education: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn promotion_is_monotonic() {
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        let mut session = sample_session();

        assert!(session.bind_claimer(alice).unwrap());
        assert!(!session.bind_claimer(alice).unwrap());

        let err = session.bind_claimer(bob).unwrap_err();
        assert!(matches!(
            err,
            SessionError::IdentityMismatch { bound, requested }
                if bound == alice && requested == bob
        ));
        assert_eq!(session.claimer, ClaimerState::Bound(alice));
    }

    #[test]
    fn claimer_state_serializes_tagged() {
        let unbound = serde_json::to_value(ClaimerState::Unbound).unwrap();
        assert_eq!(unbound, serde_json::json!({"state": "unbound"}));

        let bound = ClaimerState::Bound(Address::repeat_byte(0x11));
        let json = serde_json::to_string(&bound).unwrap();
        let back: ClaimerState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bound);
    }

    #[test]
    fn matches_checks_both_ids() {
        let session = sample_session();
        let token = validate(42u64, TokenIdSource::UserInput).unwrap();
        let other = validate(43u64, TokenIdSource::UserInput).unwrap();
        assert!(session.matches(7, token));
        assert!(!session.matches(8, token));
        assert!(!session.matches(7, other));
    }
}
