// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet sign-in with EIP-4361 (SIWE) and HS256 session credentials.
//!
//! ## Auth Flow
//!
//! 1. Client calls `POST /v1/auth/challenge` with `{address, chainId, domain}`
//! 2. Server stores a nonce-bound challenge (`siwe:nonce:<nonce>`, 10 minutes)
//!    and returns the exact message to sign
//! 3. Wallet signs the message (EIP-191 `personal_sign`)
//! 4. Client calls `POST /v1/auth/verify`; the server rebuilds the message,
//!    recovers the signer, consumes the nonce and returns a JWT
//! 5. Client sends `Authorization: Bearer <JWT>` on protected calls
//!
//! ## Security
//!
//! - Nonces are 128-bit, single-use and consumed with an atomic take
//! - Challenges are bound to an allow-listed domain and a supported chain
//! - Credentials expire (24h by default); clock skew tolerance is 60 seconds

pub mod challenge;
pub mod error;
pub mod extractor;
pub mod jwt;
pub mod session_manager;
pub mod siwe;
pub mod verifier;

pub use challenge::{Challenge, ChallengeIssuer, SiweSettings};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use jwt::{AuthenticatedUser, Credential, JwtIssuer};
pub use session_manager::SessionManager;
pub use verifier::SignatureVerifier;
