// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain constants.

/// Base Mainnet chain id.
pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;

/// Base Sepolia Testnet chain id.
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

/// Default set of chain ids accepted for sign-in.
pub fn default_supported_chains() -> Vec<u64> {
    vec![BASE_MAINNET_CHAIN_ID, BASE_SEPOLIA_CHAIN_ID]
}
