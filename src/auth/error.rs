// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Challenge and verification failures are kept distinct so the client can
/// tell "request a new challenge" apart from "wrong wallet".
#[derive(Debug)]
pub enum AuthError {
    /// Address is not a valid (or correctly checksummed) account
    InvalidAddress(String),
    /// Chain id is not served
    UnsupportedChain(u64),
    /// Signature could not be parsed or recovered
    SignatureInvalid,
    /// Nonce unknown, expired, or already consumed
    NonceExpiredOrUsed,
    /// Recovered signer differs from the claimed address
    AddressMismatch,
    /// Domain does not match the challenge or is not served
    DomainMismatch,
    /// Chain id does not match the challenge
    ChainMismatch,
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid
    InvalidTokenSignature,
    /// Token has expired
    TokenExpired,
    /// Token issuer is invalid
    InvalidIssuer,
    /// Token is not yet valid
    TokenNotYetValid,
    /// Client-side credential is missing or stale
    ReauthenticationRequired,
    /// Authenticated address is not the one the request acts for
    CredentialMismatch,
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    success: bool,
    error: String,
    message: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidAddress(_) => "invalid_address",
            AuthError::UnsupportedChain(_) => "unsupported_chain",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::NonceExpiredOrUsed => "nonce_expired_or_used",
            AuthError::AddressMismatch => "address_mismatch",
            AuthError::DomainMismatch => "domain_mismatch",
            AuthError::ChainMismatch => "chain_mismatch",
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidTokenSignature => "invalid_token_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::ReauthenticationRequired => "reauthentication_required",
            AuthError::CredentialMismatch => "credential_mismatch",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAddress(_) | AuthError::UnsupportedChain(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::SignatureInvalid
            | AuthError::NonceExpiredOrUsed
            | AuthError::AddressMismatch
            | AuthError::DomainMismatch
            | AuthError::ChainMismatch
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::InvalidTokenSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::TokenNotYetValid
            | AuthError::ReauthenticationRequired => StatusCode::UNAUTHORIZED,
            AuthError::CredentialMismatch => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidAddress(addr) => write!(f, "Invalid Ethereum address: {addr}"),
            AuthError::UnsupportedChain(id) => write!(f, "Chain {id} is not supported"),
            AuthError::SignatureInvalid => write!(f, "Signature is invalid"),
            AuthError::NonceExpiredOrUsed => {
                write!(f, "Challenge expired or already used, request a new one")
            }
            AuthError::AddressMismatch => {
                write!(f, "Signature was not produced by the requested address")
            }
            AuthError::DomainMismatch => write!(f, "Domain does not match the challenge"),
            AuthError::ChainMismatch => write!(f, "Chain id does not match the challenge"),
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidTokenSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InvalidIssuer => write!(f, "Token issuer is invalid"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::ReauthenticationRequired => {
                write!(f, "Not authenticated, sign in with your wallet again")
            }
            AuthError::CredentialMismatch => {
                write!(f, "Authenticated address does not match the claimer")
            }
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Authentication failed internally");
        }
        let body = Json(AuthErrorBody {
            success: false,
            error: self.error_code().to_string(),
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let response = AuthError::MissingAuthHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing_auth_header");
    }

    #[tokio::test]
    async fn credential_mismatch_returns_403() {
        let response = AuthError::CredentialMismatch.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn verification_failures_have_distinct_codes() {
        let codes = [
            AuthError::SignatureInvalid.error_code(),
            AuthError::NonceExpiredOrUsed.error_code(),
            AuthError::AddressMismatch.error_code(),
            AuthError::DomainMismatch.error_code(),
            AuthError::ChainMismatch.error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn bad_input_is_400() {
        assert_eq!(
            AuthError::UnsupportedChain(1).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidAddress("0x1".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
