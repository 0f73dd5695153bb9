// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key scheme for the key-value store.
//!
//! Addresses are always lowercased inside keys so the same account never maps
//! to two records. Gift state is keyed by `giftId`; the only `tokenId`-keyed
//! entry is the read-only mapping index written at registration.

use alloy::primitives::Address;

use crate::blockchain::TokenId;

/// Outstanding SIWE challenge.
pub fn siwe_nonce(nonce: &str) -> String {
    format!("siwe:nonce:{nonce}")
}

/// Claim session addressed by its opaque token.
pub fn preclaim_session(token: &str) -> String {
    format!("preclaim:session:{token}")
}

/// Education completion for a claimer on a gift.
pub fn education(claimer: &Address, gift_id: u64) -> String {
    format!("education:{}:{gift_id}", lower(claimer))
}

/// Last approval issued for a claimer on a gift.
pub fn approval(gift_id: u64, claimer: &Address) -> String {
    format!("approval:{gift_id}:{}", lower(claimer))
}

/// Canonical gift record.
pub fn gift_detail(gift_id: u64) -> String {
    format!("gift:detail:{gift_id}")
}

/// Read index from token id to gift id.
pub fn gift_mapping(token_id: TokenId) -> String {
    format!("gift:mapping:{token_id}")
}

fn lower(address: &Address) -> String {
    format!("{address:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn address_keys_are_lowercase() {
        let addr = Address::from_str("0x52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_eq!(
            education(&addr, 7),
            "education:0x52908400098527886e0f7030069857d2e4169ee7:7"
        );
        assert_eq!(
            approval(7, &addr),
            "approval:7:0x52908400098527886e0f7030069857d2e4169ee7"
        );
    }

    #[test]
    fn gift_keys_use_gift_id() {
        assert_eq!(gift_detail(42), "gift:detail:42");
        assert_eq!(preclaim_session("tok"), "preclaim:session:tok");
        assert_eq!(siwe_nonce("n1"), "siwe:nonce:n1");
    }
}
