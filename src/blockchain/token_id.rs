// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token identifier validation.
//!
//! Every token id that crosses a trust boundary (a Transfer log, a request
//! body, a stored record, a contract read) goes through [`validate`]. The
//! rules are identical for every origin:
//!
//! - must parse as a non-negative integer
//! - must not be zero: the gift contracts never mint id 0, so a zero id means
//!   the mint itself failed upstream
//! - must not exceed [`MAX_TOKEN_ID`]
//!
//! Zero, negative and oversized ids are *critical*; unparsable input is merely
//! invalid. Operators respond to the two differently, so the kinds stay apart.

use std::fmt;

use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};

/// Largest accepted token id (2^53 - 1).
///
/// Ids are exchanged with browser clients as JSON and must stay exact there.
pub const MAX_TOKEN_ID: u64 = 9_007_199_254_740_991;

/// A validated, non-zero token identifier.
///
/// Serialized as a decimal string. Deserialization re-validates, so a
/// corrupted record can never yield an unchecked id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TokenId(u64);

impl TokenId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TokenId> for String {
    fn from(value: TokenId) -> Self {
        value.0.to_string()
    }
}

impl TryFrom<String> for TokenId {
    type Error = TokenIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate(value, TokenIdSource::Stored)
    }
}

/// Where a raw token id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenIdSource {
    TransferEvent,
    UserInput,
    ContractState,
    Stored,
    TrustBoundary,
}

impl fmt::Display for TokenIdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenIdSource::TransferEvent => "transfer_event",
            TokenIdSource::UserInput => "user_input",
            TokenIdSource::ContractState => "contract_state",
            TokenIdSource::Stored => "stored",
            TokenIdSource::TrustBoundary => "trust_boundary",
        };
        f.write_str(s)
    }
}

/// Unvalidated token id in any of the shapes it arrives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTokenId {
    /// Decimal (`"42"`) or hex (`"0x2a"`) text.
    Text(String),
    Unsigned(u128),
    Signed(i128),
    /// A full 256-bit word, e.g. a decoded log topic.
    Word(U256),
}

impl fmt::Display for RawTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawTokenId::Text(s) => f.write_str(s),
            RawTokenId::Unsigned(v) => write!(f, "{v}"),
            RawTokenId::Signed(v) => write!(f, "{v}"),
            RawTokenId::Word(w) => write!(f, "{w:#x}"),
        }
    }
}

impl From<&str> for RawTokenId {
    fn from(value: &str) -> Self {
        RawTokenId::Text(value.to_string())
    }
}

impl From<String> for RawTokenId {
    fn from(value: String) -> Self {
        RawTokenId::Text(value)
    }
}

impl From<u32> for RawTokenId {
    fn from(value: u32) -> Self {
        RawTokenId::Unsigned(value.into())
    }
}

impl From<u64> for RawTokenId {
    fn from(value: u64) -> Self {
        RawTokenId::Unsigned(value.into())
    }
}

impl From<i32> for RawTokenId {
    fn from(value: i32) -> Self {
        RawTokenId::Signed(value.into())
    }
}

impl From<i64> for RawTokenId {
    fn from(value: i64) -> Self {
        RawTokenId::Signed(value.into())
    }
}

impl From<U256> for RawTokenId {
    fn from(value: U256) -> Self {
        RawTokenId::Word(value)
    }
}

impl From<B256> for RawTokenId {
    fn from(value: B256) -> Self {
        RawTokenId::Word(U256::from_be_bytes(value.0))
    }
}

/// Why a token id was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenIdErrorKind {
    Missing,
    Malformed,
    Negative,
    Zero,
    TooLarge,
    /// Transfer log did not carry exactly four topics.
    TopicCount(usize),
    /// Log signature is not `Transfer(address,address,uint256)`.
    NotTransferEvent,
}

impl TokenIdErrorKind {
    /// Critical kinds point at a failed upstream transaction, not a client bug.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            TokenIdErrorKind::Zero | TokenIdErrorKind::Negative | TokenIdErrorKind::TooLarge
        )
    }

    pub fn error_code(self) -> &'static str {
        match self {
            TokenIdErrorKind::Missing => "token_id_missing",
            TokenIdErrorKind::Malformed => "token_id_malformed",
            TokenIdErrorKind::Negative => "token_id_negative",
            TokenIdErrorKind::Zero => "token_id_zero",
            TokenIdErrorKind::TooLarge => "token_id_too_large",
            TokenIdErrorKind::TopicCount(_) | TokenIdErrorKind::NotTransferEvent => {
                "transfer_log_invalid"
            }
        }
    }
}

/// Token id validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TokenIdError {
    pub kind: TokenIdErrorKind,
    pub origin: TokenIdSource,
    pub raw: String,
    pub context: Option<String>,
    message: String,
}

impl TokenIdError {
    pub(crate) fn new(kind: TokenIdErrorKind, origin: TokenIdSource, raw: String) -> Self {
        let message = render(kind, origin, &raw);
        Self {
            kind,
            origin,
            raw,
            context: None,
            message,
        }
    }

    fn with_context(mut self, context: &str) -> Self {
        self.message = format!("[{context}] {}", self.message);
        self.context = Some(context.to_string());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }

    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }
}

fn render(kind: TokenIdErrorKind, origin: TokenIdSource, raw: &str) -> String {
    match kind {
        TokenIdErrorKind::Missing => format!("tokenId is missing ({origin})"),
        TokenIdErrorKind::Malformed => format!("Invalid tokenId format {raw:?} ({origin})"),
        TokenIdErrorKind::Negative => {
            format!("CRITICAL: tokenId {raw} is negative ({origin})")
        }
        TokenIdErrorKind::Zero => format!(
            "CRITICAL: tokenId is 0 ({origin}); the mint transaction failed or its log is malformed"
        ),
        TokenIdErrorKind::TooLarge => format!(
            "CRITICAL: tokenId {raw} is unreasonably large ({origin}, max {MAX_TOKEN_ID})"
        ),
        TokenIdErrorKind::TopicCount(n) => {
            format!("Transfer event must carry exactly 4 topics, got {n}")
        }
        TokenIdErrorKind::NotTransferEvent => {
            "Log is not a Transfer(address,address,uint256) event".to_string()
        }
    }
}

/// Validate a raw token id from the given origin.
pub fn validate(
    raw: impl Into<RawTokenId>,
    origin: TokenIdSource,
) -> Result<TokenId, TokenIdError> {
    let raw = raw.into();
    check(&raw).map_err(|kind| {
        let err = TokenIdError::new(kind, origin, raw.to_string());
        log_rejection(&err);
        err
    })
}

/// Validate at a trust boundary, tagging any failure with `context`.
///
/// Use immediately before a token id is persisted or passed to a contract.
pub fn assert_valid_token_id(
    raw: impl Into<RawTokenId>,
    context: &str,
) -> Result<TokenId, TokenIdError> {
    let raw = raw.into();
    check(&raw).map_err(|kind| {
        let err = TokenIdError::new(kind, TokenIdSource::TrustBoundary, raw.to_string())
            .with_context(context);
        log_rejection(&err);
        err
    })
}

fn log_rejection(err: &TokenIdError) {
    if err.is_critical() {
        tracing::error!(
            origin = %err.origin,
            raw = %err.raw,
            code = err.error_code(),
            "Critical token id rejected"
        );
    } else {
        tracing::warn!(
            origin = %err.origin,
            code = err.error_code(),
            "Token id rejected"
        );
    }
}

fn check(raw: &RawTokenId) -> Result<TokenId, TokenIdErrorKind> {
    let value = match raw {
        RawTokenId::Text(s) => parse_text(s)?,
        RawTokenId::Unsigned(v) => U256::from(*v),
        RawTokenId::Signed(v) if *v < 0 => return Err(TokenIdErrorKind::Negative),
        RawTokenId::Signed(v) => U256::from(v.unsigned_abs()),
        RawTokenId::Word(w) => *w,
    };

    if value.is_zero() {
        return Err(TokenIdErrorKind::Zero);
    }
    if value > U256::from(MAX_TOKEN_ID) {
        return Err(TokenIdErrorKind::TooLarge);
    }
    u64::try_from(value)
        .map(TokenId)
        .map_err(|_| TokenIdErrorKind::TooLarge)
}

fn parse_text(s: &str) -> Result<U256, TokenIdErrorKind> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(TokenIdErrorKind::Missing);
    }
    if let Some(rest) = trimmed.strip_prefix('-') {
        // A well-formed number behind the sign is negative, anything else is garbage
        return match parse_unsigned(rest) {
            Ok(_) => Err(TokenIdErrorKind::Negative),
            Err(_) => Err(TokenIdErrorKind::Malformed),
        };
    }
    parse_unsigned(trimmed)
}

fn parse_unsigned(s: &str) -> Result<U256, TokenIdErrorKind> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TokenIdErrorKind::Malformed);
        }
        let digits = hex.trim_start_matches('0');
        if digits.is_empty() {
            return Ok(U256::ZERO);
        }
        if digits.len() > 64 {
            return Err(TokenIdErrorKind::TooLarge);
        }
        return U256::from_str_radix(digits, 16).map_err(|_| TokenIdErrorKind::Malformed);
    }

    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(TokenIdErrorKind::Malformed);
    }
    let digits = s.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    // Anything that overflows 256 bits is certainly too large
    U256::from_str_radix(digits, 10).map_err(|_| TokenIdErrorKind::TooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_decimal_hex_and_numeric() {
        assert_eq!(validate("1", TokenIdSource::UserInput).unwrap().get(), 1);
        assert_eq!(validate("0x2a", TokenIdSource::UserInput).unwrap().get(), 42);
        assert_eq!(validate(" 17 ", TokenIdSource::UserInput).unwrap().get(), 17);
        assert_eq!(validate(5u64, TokenIdSource::ContractState).unwrap().get(), 5);
        assert_eq!(
            validate(U256::from(9u64), TokenIdSource::ContractState).unwrap().get(),
            9
        );
    }

    #[test]
    fn zero_is_critical_in_every_shape() {
        let inputs: Vec<RawTokenId> = vec![
            "0x0".into(),
            "0".into(),
            "0x0000000000000000000000000000000000000000000000000000000000000000".into(),
            0i32.into(),
            0u64.into(),
            U256::ZERO.into(),
            B256::ZERO.into(),
        ];
        for raw in inputs {
            let err = validate(raw.clone(), TokenIdSource::TransferEvent).unwrap_err();
            assert_eq!(err.kind, TokenIdErrorKind::Zero, "input {raw}");
            assert!(err.to_string().contains("CRITICAL"), "input {raw}");
            assert!(err.is_critical());
        }
    }

    #[test]
    fn zero_and_malformed_are_distinct() {
        let zero = validate("0", TokenIdSource::UserInput).unwrap_err();
        let garbage = validate("abc", TokenIdSource::UserInput).unwrap_err();
        assert_ne!(zero.kind, garbage.kind);
        assert!(!garbage.is_critical());
        assert!(!garbage.to_string().contains("CRITICAL"));
        assert_eq!(garbage.error_code(), "token_id_malformed");
    }

    #[test]
    fn negative_is_critical() {
        let err = validate("-5", TokenIdSource::UserInput).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::Negative);
        assert!(err.to_string().contains("CRITICAL"));

        let err = validate(-1i64, TokenIdSource::UserInput).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::Negative);

        let err = validate("-x", TokenIdSource::UserInput).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::Malformed);
    }

    #[test]
    fn max_uint256_is_unreasonably_large() {
        let err = validate(U256::MAX, TokenIdSource::TransferEvent).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::TooLarge);
        assert!(err.to_string().contains("unreasonably large"));

        let hex_max = format!("0x{}", "f".repeat(64));
        let err = validate(hex_max, TokenIdSource::TransferEvent).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::TooLarge);

        let err = validate("9".repeat(100), TokenIdSource::UserInput).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::TooLarge);
    }

    #[test]
    fn bound_is_inclusive() {
        assert_eq!(
            validate(MAX_TOKEN_ID, TokenIdSource::UserInput).unwrap().get(),
            MAX_TOKEN_ID
        );
        let err = validate(MAX_TOKEN_ID + 1, TokenIdSource::UserInput).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::TooLarge);
    }

    #[test]
    fn empty_is_missing() {
        let err = validate("  ", TokenIdSource::UserInput).unwrap_err();
        assert_eq!(err.kind, TokenIdErrorKind::Missing);
    }

    #[test]
    fn assert_valid_carries_context() {
        let err = assert_valid_token_id("0", "gift registration").unwrap_err();
        assert_eq!(err.context.as_deref(), Some("gift registration"));
        assert!(err.to_string().starts_with("[gift registration] CRITICAL"));
        assert_eq!(err.origin, TokenIdSource::TrustBoundary);

        assert_eq!(assert_valid_token_id("12", "ctx").unwrap().get(), 12);
    }

    #[test]
    fn serde_roundtrip_revalidates() {
        let id = validate("77", TokenIdSource::UserInput).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""77""#);
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<TokenId>(r#""0""#).is_err());
    }
}
