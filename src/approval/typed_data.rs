// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-712 schema of the education approval.
//!
//! Field names, types and order must match the gate contract's typehash
//! exactly; a change here silently invalidates every signature on-chain.

use std::borrow::Cow;

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};

/// EIP-712 domain name of the gate contract.
pub const DOMAIN_NAME: &str = "SimpleApprovalGate";

/// EIP-712 domain version of the gate contract.
pub const DOMAIN_VERSION: &str = "1";

/// Requirements version the deployed gate checks against.
pub const REQUIREMENTS_VERSION: u16 = 1;

sol! {
    /// Capability letting `claimer` pass the education gate of `giftId`.
    #[derive(Debug, PartialEq, Eq)]
    struct EducationApproval {
        address claimer;
        uint256 giftId;
        uint16 requirementsVersion;
        uint256 deadline;
        uint256 chainId;
        address verifyingContract;
    }
}

impl EducationApproval {
    pub fn new(
        claimer: Address,
        gift_id: u64,
        deadline: u64,
        chain_id: u64,
        gate: Address,
    ) -> Self {
        Self {
            claimer,
            giftId: U256::from(gift_id),
            requirementsVersion: REQUIREMENTS_VERSION,
            deadline: U256::from(deadline),
            chainId: U256::from(chain_id),
            verifyingContract: gate,
        }
    }
}

/// The gate's EIP-712 domain on `chain_id`.
pub fn approval_domain(chain_id: u64, gate: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Borrowed(DOMAIN_NAME)),
        Some(Cow::Borrowed(DOMAIN_VERSION)),
        Some(U256::from(chain_id)),
        Some(gate),
        None,
    )
}

/// `keccak256("\x19\x01" ‖ domainSeparator ‖ hashStruct(message))`
pub fn approval_signing_hash(message: &EducationApproval, domain: &Eip712Domain) -> B256 {
    message.eip712_signing_hash(domain)
}
