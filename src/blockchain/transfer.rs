// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-721 Transfer log decoding.
//!
//! `Transfer(address indexed from, address indexed to, uint256 indexed tokenId)`
//! carries everything in its topics: `[signature, from, to, tokenId]`.

use alloy::primitives::{Address, Log, B256};

use super::token_id::{validate, TokenId, TokenIdError, TokenIdErrorKind, TokenIdSource};

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_EVENT_SIGNATURE: B256 = B256::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
]);

/// A decoded, validated ERC-721 Transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLog {
    pub from: Address,
    pub to: Address,
    pub token_id: TokenId,
}

impl TransferLog {
    /// Mints transfer from the zero address.
    pub fn is_mint(&self) -> bool {
        self.from == Address::ZERO
    }
}

/// Decode and validate all fields of a Transfer log from its topics.
pub fn decode_transfer_log(topics: &[B256]) -> Result<TransferLog, TokenIdError> {
    if topics.len() != 4 {
        return Err(TokenIdError::new(
            TokenIdErrorKind::TopicCount(topics.len()),
            TokenIdSource::TransferEvent,
            format!("{} topics", topics.len()),
        ));
    }
    if topics[0] != TRANSFER_EVENT_SIGNATURE {
        return Err(TokenIdError::new(
            TokenIdErrorKind::NotTransferEvent,
            TokenIdSource::TransferEvent,
            format!("{:#x}", topics[0]),
        ));
    }

    Ok(TransferLog {
        from: Address::from_word(topics[1]),
        to: Address::from_word(topics[2]),
        token_id: validate(topics[3], TokenIdSource::TransferEvent)?,
    })
}

/// Recover the token id from a Transfer log's topics.
pub fn extract_from_transfer_log(topics: &[B256]) -> Result<TokenId, TokenIdError> {
    decode_transfer_log(topics).map(|t| t.token_id)
}

/// Find the mint emitted by `contract` among a receipt's logs.
///
/// Returns `Ok(None)` when the receipt holds no Transfer from `contract`. A
/// Transfer that is present but carries a bad token id is an error, never
/// skipped.
pub fn find_mint(logs: &[Log], contract: Address) -> Result<Option<TransferLog>, TokenIdError> {
    for log in logs {
        if log.address != contract {
            continue;
        }
        let topics = log.data.topics();
        if topics.first() != Some(&TRANSFER_EVENT_SIGNATURE) {
            continue;
        }
        let transfer = decode_transfer_log(topics)?;
        if transfer.is_mint() {
            return Ok(Some(transfer));
        }
    }
    Ok(None)
}

/// Parse topics supplied as hex strings.
pub fn parse_topics(raw: &[String]) -> Result<Vec<B256>, TokenIdError> {
    raw.iter()
        .map(|t| {
            t.trim().parse::<B256>().map_err(|_| {
                TokenIdError::new(
                    TokenIdErrorKind::Malformed,
                    TokenIdSource::TransferEvent,
                    t.clone(),
                )
            })
        })
        .collect()
}
