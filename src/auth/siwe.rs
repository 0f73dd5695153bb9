// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-4361 (Sign-In With Ethereum) message handling.
//!
//! The message is rendered from its fields only, so the verifier can rebuild
//! byte-for-byte what the wallet signed from the stored challenge.

use std::fmt;

use alloy::primitives::{Address, Signature};
use chrono::{DateTime, SecondsFormat, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// SIWE message version.
pub const SIWE_VERSION: &str = "1";

const NONCE_BYTES: usize = 16;

/// The fields of a SIWE message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiweMessage {
    pub domain: String,
    pub address: Address,
    pub statement: String,
    pub uri: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}

impl SiweMessage {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration_time
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} wants you to sign in with your Ethereum account:",
            self.domain
        )?;
        writeln!(f, "{}", self.address.to_checksum(None))?;
        writeln!(f)?;
        writeln!(f, "{}", self.statement)?;
        writeln!(f)?;
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: {SIWE_VERSION}")?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        writeln!(f, "Issued At: {}", timestamp(&self.issued_at))?;
        write!(f, "Expiration Time: {}", timestamp(&self.expiration_time))
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generate a 128-bit alphanumeric nonce.
pub fn generate_nonce(rng: &SystemRandom) -> Result<String, AuthError> {
    let mut bytes = [0u8; NONCE_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| AuthError::InternalError("nonce generation failed".to_string()))?;
    Ok(alloy::hex::encode(bytes))
}

/// Parse an account address.
///
/// All-lowercase and all-uppercase hex are accepted as-is; mixed case must
/// carry a valid EIP-55 checksum.
pub fn parse_address(raw: &str) -> Result<Address, AuthError> {
    let trimmed = raw.trim();
    let invalid = || AuthError::InvalidAddress(raw.to_string());

    let hex = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(trimmed, None).map_err(|_| invalid())
    } else {
        trimmed.parse::<Address>().map_err(|_| invalid())
    }
}

/// Normalize a SIWE domain (RFC 3986 authority): drop any scheme, path and
/// trailing slash, lowercase the rest.
pub fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    authority.to_ascii_lowercase()
}

/// Recover the EIP-191 signer of `message` from a 65-byte hex signature.
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, AuthError> {
    let bytes = alloy::hex::decode(signature.trim()).map_err(|_| AuthError::SignatureInvalid)?;
    if bytes.len() != 65 {
        return Err(AuthError::SignatureInvalid);
    }
    let signature = Signature::from_raw(&bytes).map_err(|_| AuthError::SignatureInvalid)?;
    signature
        .recover_address_from_msg(message)
        .map_err(|_| AuthError::SignatureInvalid)
}
