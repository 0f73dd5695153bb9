// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gate data: the blob the gate contract splits back into signature and deadline.
//!
//! ```text
//! r (32) ‖ s (32) ‖ v (1, 27|28) ‖ deadline (32, big-endian uint256)
//! ```

use alloy::primitives::{Bytes, Signature, U256};

/// Raw signature length.
pub const SIGNATURE_LEN: usize = 65;

/// Total encoded length.
pub const GATE_DATA_LEN: usize = SIGNATURE_LEN + 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GateDataError {
    #[error("gate data must be {GATE_DATA_LEN} bytes, got {0}")]
    Length(usize),

    #[error("gate data carries an invalid signature")]
    Signature,

    #[error("gate data deadline does not fit in 64 bits")]
    Deadline,
}

/// Concatenate the signature with the ABI-encoded deadline.
pub fn encode(signature: &Signature, deadline: u64) -> Bytes {
    let mut out = Vec::with_capacity(GATE_DATA_LEN);
    out.extend_from_slice(&signature.as_bytes());
    out.extend_from_slice(&U256::from(deadline).to_be_bytes::<32>());
    Bytes::from(out)
}

/// Split gate data back into its parts.
pub fn decode(data: &[u8]) -> Result<(Signature, u64), GateDataError> {
    if data.len() != GATE_DATA_LEN {
        return Err(GateDataError::Length(data.len()));
    }
    let signature =
        Signature::from_raw(&data[..SIGNATURE_LEN]).map_err(|_| GateDataError::Signature)?;
    let deadline = U256::from_be_slice(&data[SIGNATURE_LEN..]);
    let deadline = u64::try_from(deadline).map_err(|_| GateDataError::Deadline)?;
    Ok((signature, deadline))
}
