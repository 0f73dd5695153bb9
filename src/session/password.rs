// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gift password hashing (HMAC-SHA256 keyed by a per-gift salt).

use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SALT_BYTES: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("random source failed")]
    Random,

    #[error("invalid HMAC key: {0}")]
    Key(#[from] hmac::digest::InvalidLength),
}

/// A salted password digest, both parts hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    pub salt: String,
    pub hash: String,
}

/// Hash `password` under a fresh random salt.
pub fn hash_password(password: &str) -> Result<PasswordDigest, PasswordError> {
    let mut salt = [0u8; SALT_BYTES];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| PasswordError::Random)?;
    let hash = digest(&salt, password)?;
    Ok(PasswordDigest {
        salt: alloy::hex::encode(salt),
        hash: alloy::hex::encode(hash),
    })
}

/// Constant-time check of `password` against a stored digest.
///
/// Malformed stored values never verify.
pub fn verify_password(salt_hex: &str, hash_hex: &str, password: &str) -> bool {
    let (Ok(salt), Ok(expected)) = (alloy::hex::decode(salt_hex), alloy::hex::decode(hash_hex))
    else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(&salt) else {
        return false;
    };
    mac.update(password.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn digest(salt: &[u8], password: &str) -> Result<Vec<u8>, PasswordError> {
    let mut mac = HmacSha256::new_from_slice(salt)?;
    mac.update(password.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let digest = hash_password("open sesame").unwrap();
        assert_eq!(digest.salt.len(), SALT_BYTES * 2);
        assert!(verify_password(&digest.salt, &digest.hash, "open sesame"));
        assert!(!verify_password(&digest.salt, &digest.hash, "open sesame "));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn garbage_digest_never_verifies() {
        assert!(!verify_password("zz", "00", "pw"));
        assert!(!verify_password("00", "", "pw"));
    }
}
