// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Education approval issuance.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, Signature};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::gate_data;
use super::typed_data::{approval_domain, EducationApproval};
use super::wallet::ApproverWallet;
use super::ApprovalError;
use crate::blockchain::TokenId;
use crate::config::{ApproverConfig, ConfigError};
use crate::session::{ClaimSessionStore, SessionError};
use crate::storage::gifts::ApprovalPath;
use crate::storage::{ApprovalRecord, GiftAnalytics, GiftRepository, KvStore};

/// A request for an approval signature.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub session_token: String,
    pub token_id: TokenId,
    pub claimer: Address,
    /// Defaults to the session's gift
    pub gift_id: Option<u64>,
    pub email: Option<String>,
    pub questions_score: Option<u32>,
    pub questions_answered: Option<u32>,
}

/// A signed approval.
#[derive(Debug, Clone)]
pub struct ApprovalGrant {
    pub approval_id: Uuid,
    pub gift_id: u64,
    pub claimer: Address,
    pub signature: Signature,
    pub deadline: u64,
    pub gate_data: Bytes,
    pub path: ApprovalPath,
}

pub struct ApprovalService {
    store: Arc<dyn KvStore>,
    sessions: ClaimSessionStore,
    approver: Result<ApproverConfig, ConfigError>,
}

impl ApprovalService {
    pub fn new(
        store: Arc<dyn KvStore>,
        sessions: ClaimSessionStore,
        approver: Result<ApproverConfig, ConfigError>,
    ) -> Self {
        Self {
            store,
            sessions,
            approver,
        }
    }

    /// Load the approver key and check it against the address the gate
    /// trusts. Returns the signer's address.
    pub fn check_approver(&self) -> Result<Address, ApprovalError> {
        self.signer().map(|(_, wallet)| wallet.address())
    }

    fn signer(&self) -> Result<(&ApproverConfig, ApproverWallet), ApprovalError> {
        let approver = self.approver.as_ref().map_err(|e| {
            tracing::error!(error = %e, "Approver is not configured, refusing to sign");
            ApprovalError::ApproverMisconfigured(e.to_string())
        })?;
        let wallet = approver.key.load().map_err(|e| {
            tracing::error!(error = %e, "Approver key cannot be loaded, refusing to sign");
            ApprovalError::ApproverMisconfigured(e.to_string())
        })?;
        if wallet.address() != approver.expected_address {
            tracing::error!(
                derived = %wallet.address(),
                expected = %approver.expected_address,
                "Approver key does not match the address the gate trusts, refusing to sign"
            );
            return Err(ApprovalError::ApproverMisconfigured(format!(
                "approver key resolves to {}, gate expects {}",
                wallet.address(),
                approver.expected_address
            )));
        }
        Ok((approver, wallet))
    }

    /// Issue an approval for `request`.
    ///
    /// Preconditions are checked in a fixed order and each has its own error:
    /// live session, matching gift/token, claimer identity, education (or the
    /// password bypass), and finally the approver key itself.
    pub fn approve(
        &self,
        request: &ApprovalRequest,
        now: DateTime<Utc>,
    ) -> Result<ApprovalGrant, ApprovalError> {
        let session = self
            .sessions
            .get(&request.session_token)?
            .ok_or(ApprovalError::SessionInvalid)?;

        let gift_id = request.gift_id.unwrap_or(session.gift_id);
        if !session.matches(gift_id, request.token_id) {
            tracing::warn!(
                gift_id,
                token_id = %request.token_id,
                "Approval request does not match its claim session"
            );
            return Err(ApprovalError::SessionMismatch);
        }

        // Runs inside the store's atomic update: a racing promotion to another
        // address makes this call observe it and fail
        let session = self
            .sessions
            .bind_claimer(&request.session_token, request.claimer)
            .map_err(|e| match e {
                SessionError::IdentityMismatch { bound, requested } => {
                    tracing::warn!(
                        gift_id,
                        bound = %bound,
                        requested = %requested,
                        "Claim session bound to a different claimer"
                    );
                    ApprovalError::IdentityMismatch
                }
                other => other.into(),
            })?;

        let gifts = GiftRepository::new(self.store.as_ref());
        let path = if gifts.education(&request.claimer, gift_id)?.is_some() {
            ApprovalPath::Education
        } else if session.password_validated && session.requires_education {
            tracing::warn!(
                gift_id,
                claimer = %request.claimer,
                approval_path = ApprovalPath::Bypass.as_str(),
                "Issuing approval without recorded education completion"
            );
            ApprovalPath::Bypass
        } else {
            return Err(ApprovalError::EducationIncomplete);
        };

        let (approver, wallet) = self.signer()?;
        let deadline = deadline_after(now, approver.ttl)?;
        let message = EducationApproval::new(
            request.claimer,
            gift_id,
            deadline,
            approver.chain_id,
            approver.gate_address,
        );
        let domain = approval_domain(approver.chain_id, approver.gate_address);
        let signature = wallet
            .sign_approval(&message, &domain)
            .map_err(|e| ApprovalError::Signing(e.to_string()))?;
        drop(wallet);

        let grant = ApprovalGrant {
            approval_id: Uuid::new_v4(),
            gift_id,
            claimer: request.claimer,
            signature,
            deadline,
            gate_data: gate_data::encode(&signature, deadline),
            path,
        };

        gifts.record_approval(&ApprovalRecord {
            approval_id: grant.approval_id,
            gift_id,
            claimer: grant.claimer,
            deadline,
            path,
            issued_at: now,
        })?;

        let analytics = GiftAnalytics {
            education_score: request.questions_score,
            questions_answered: request.questions_answered,
            email_captured: request.email.as_deref().is_some_and(|e| !e.trim().is_empty()),
            last_approved_at: Some(now),
        };
        match gifts.merge_analytics(gift_id, &analytics) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(gift_id, "No gift record to merge analytics into"),
            Err(e) => tracing::warn!(gift_id, error = %e, "Failed to merge approval analytics"),
        }

        tracing::info!(
            approval_id = %grant.approval_id,
            gift_id,
            claimer = %grant.claimer,
            deadline,
            approval_path = path.as_str(),
            "Approval issued"
        );
        Ok(grant)
    }
}

fn deadline_after(now: DateTime<Utc>, ttl: std::time::Duration) -> Result<u64, ApprovalError> {
    let now = u64::try_from(now.timestamp())
        .map_err(|_| ApprovalError::Signing("clock before unix epoch".to_string()))?;
    Ok(now.saturating_add(ttl.as_secs()))
}
