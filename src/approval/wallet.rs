// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The approver key.
//!
//! An [`ApproverWallet`] is loaded from its configured source for a single
//! signing call and dropped right after. The key never appears in logs or
//! `Debug` output.

use std::fmt;
use std::path::{Path, PathBuf};

use alloy::primitives::{Address, Signature};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy::sol_types::Eip712Domain;
use k256::SecretKey;

use super::typed_data::{approval_signing_hash, EducationApproval};

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("invalid approver key: {0}")]
    InvalidKey(String),

    #[error("cannot read approver key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Where the approver key comes from.
#[derive(Clone)]
pub enum ApproverKeySource {
    /// Hex-encoded 32-byte secret (with or without `0x`)
    Hex(String),
    /// PEM file (SEC1 or PKCS#8), re-read on every load
    PemFile(PathBuf),
}

impl fmt::Debug for ApproverKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApproverKeySource::Hex(_) => f.write_str("Hex(<redacted>)"),
            ApproverKeySource::PemFile(path) => f.debug_tuple("PemFile").field(path).finish(),
        }
    }
}

impl ApproverKeySource {
    pub fn load(&self) -> Result<ApproverWallet, WalletError> {
        match self {
            ApproverKeySource::Hex(hex) => ApproverWallet::from_hex(hex),
            ApproverKeySource::PemFile(path) => ApproverWallet::from_pem_file(path),
        }
    }
}

pub struct ApproverWallet {
    signer: PrivateKeySigner,
}

impl fmt::Debug for ApproverWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApproverWallet")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl ApproverWallet {
    pub fn from_hex(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_bytes = alloy::hex::decode(private_key_hex.trim())
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }

    /// Parse a PEM-encoded secp256k1 key.
    pub fn from_pem(pem_bytes: &[u8]) -> Result<Self, WalletError> {
        let pem_str = std::str::from_utf8(pem_bytes)
            .map_err(|e| WalletError::InvalidKey(format!("Invalid UTF-8: {e}")))?;
        let pem = pem::parse(pem_str)
            .map_err(|e| WalletError::InvalidKey(format!("Invalid PEM: {e}")))?;

        let secret_key = SecretKey::from_sec1_der(pem.contents())
            .or_else(|_| {
                use k256::pkcs8::DecodePrivateKey;
                SecretKey::from_pkcs8_der(pem.contents())
            })
            .map_err(|e| WalletError::InvalidKey(format!("Invalid key format: {e}")))?;

        let signer = PrivateKeySigner::from_slice(secret_key.to_bytes().as_slice())
            .map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, WalletError> {
        let bytes = std::fs::read(path).map_err(|source| WalletError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_pem(&bytes)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign the EIP-712 digest of `message` under `domain`.
    pub fn sign_approval(
        &self,
        message: &EducationApproval,
        domain: &Eip712Domain,
    ) -> Result<Signature, WalletError> {
        let hash = approval_signing_hash(message, domain);
        self.signer
            .sign_hash_sync(&hash)
            .map_err(|e| WalletError::Signing(e.to_string()))
    }
}
