// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module.
//!
//! This module provides functionality for:
//! - Validating token identifiers at every trust boundary
//! - Decoding ERC-721 Transfer logs into validated token ids
//! - Reading mint receipts from an EVM JSON-RPC endpoint

pub mod client;
pub mod token_id;
pub mod transfer;
pub mod types;

pub use client::{ChainClient, ChainClientError, MintReceipt};
pub use token_id::{
    assert_valid_token_id, validate, RawTokenId, TokenId, TokenIdError, TokenIdErrorKind,
    TokenIdSource, MAX_TOKEN_ID,
};
pub use transfer::{
    decode_transfer_log, extract_from_transfer_log, find_mint, parse_topics, TransferLog,
    TRANSFER_EVENT_SIGNATURE,
};
pub use types::*;
