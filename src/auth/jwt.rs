// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session credentials (HS256 JWTs) minted after a verified sign-in.

use std::time::Duration;

use alloy::primitives::Address;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AuthError;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Default credential lifetime.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Credentials are treated as stale this long before they actually expire.
pub const EXPIRY_BUFFER: Duration = Duration::from_secs(5 * 60);

/// Issuer claim.
pub const ISSUER: &str = "giftgate";

/// Minimum HS256 secret length.
pub const MIN_SECRET_LEN: usize = 32;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    /// Lowercase address
    sub: String,
    /// Checksummed address
    address: String,
    iat: i64,
    exp: i64,
    iss: String,
}

/// A signed session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    #[schema(value_type = String)]
    pub address: Address,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// False once `now` passes `expires_at` minus the safety buffer.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        let buffer = chrono::Duration::from_std(EXPIRY_BUFFER).unwrap_or_default();
        now <= self.expires_at - buffer
    }
}

/// The identity carried by a validated credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub address: Address,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Issues and validates session credentials.
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer").field("ttl", &self.ttl).finish()
    }
}

impl JwtIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a credential for `address`.
    pub fn issue(&self, address: Address, now: DateTime<Utc>) -> Result<Credential, AuthError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let expires_at = now + ttl;

        let claims = Claims {
            sub: format!("{address:#x}"),
            address: address.to_checksum(None),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: ISSUER.to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        Ok(Credential {
            token,
            address,
            issued_at: timestamp_to_datetime(claims.iat)?,
            expires_at: timestamp_to_datetime(claims.exp)?,
        })
    }

    /// Validate signature, expiry and issuer of a bearer token.
    pub fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidTokenSignature
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            }
        })?;

        let claims = data.claims;
        let address: Address = claims.sub.parse().map_err(|_| AuthError::MalformedToken)?;

        Ok(AuthenticatedUser {
            address,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}

fn timestamp_to_datetime(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::InternalError(format!("timestamp out of range: {secs}")))
}
