// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GiftGate - Claim Authorization Service
//!
//! Wallet sign-in, password-gated claim sessions and EIP-712 education
//! approvals for NFT gifts.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Sign-In With Ethereum and HS256 credentials
//! - `approval` - EIP-712 approval signing and gate data
//! - `blockchain` - Token id validation and Transfer log decoding
//! - `session` - Claim sessions and gift passwords
//! - `storage` - TTL key-value store (in-memory or redb)

pub mod api;
pub mod approval;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod session;
pub mod state;
pub mod storage;
