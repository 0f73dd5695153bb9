// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Education Approvals
//!
//! Signs EIP-712 `EducationApproval` capabilities with the single approver
//! key the gate contract trusts, and packs signature and deadline into the
//! gate data blob the contract consumes.
//!
//! Approvals are stateless on-chain: validity is bounded by `deadline` only,
//! so two approvals for the same claimer and gift are both usable until they
//! expire.

pub mod gate_data;
pub mod service;
pub mod typed_data;
pub mod wallet;

pub use service::{ApprovalGrant, ApprovalRequest, ApprovalService};
pub use typed_data::{approval_domain, approval_signing_hash, EducationApproval};
pub use wallet::{ApproverKeySource, ApproverWallet, WalletError};

use crate::session::SessionError;
use crate::storage::StorageError;

/// Approval failures, in the order the preconditions are checked.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("Claim session is missing or expired")]
    SessionInvalid,

    #[error("Claim session belongs to a different gift")]
    SessionMismatch,

    #[error("This claim session is bound to a different wallet")]
    IdentityMismatch,

    #[error("Education requirements are not complete")]
    EducationIncomplete,

    #[error("Approver is misconfigured: {0}")]
    ApproverMisconfigured(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApprovalError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApprovalError::SessionInvalid => "session_invalid",
            ApprovalError::SessionMismatch => "session_mismatch",
            ApprovalError::IdentityMismatch => "identity_mismatch",
            ApprovalError::EducationIncomplete => "education_incomplete",
            ApprovalError::ApproverMisconfigured(_) => "approver_misconfigured",
            ApprovalError::Signing(_) => "signing_failed",
            ApprovalError::Storage(_) => "storage_error",
        }
    }
}

impl From<SessionError> for ApprovalError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ApprovalError::SessionInvalid,
            SessionError::IdentityMismatch { .. } => ApprovalError::IdentityMismatch,
            SessionError::Random => ApprovalError::Signing(err.to_string()),
            SessionError::Storage(e) => ApprovalError::Storage(e),
        }
    }
}
