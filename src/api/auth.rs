// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet sign-in endpoints (EIP-4361 challenge and verification).

use axum::{extract::State, Json};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiJson;
use crate::{auth::Auth, error::ApiError, state::AppState};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Wallet address, `0x`-prefixed
    pub address: String,
    pub chain_id: u64,
    /// Domain the dApp is served from
    pub domain: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub success: bool,
    pub nonce: String,
    /// EIP-4361 message the wallet must sign verbatim
    pub message: String,
    pub domain: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub address: String,
    /// 65-byte EIP-191 signature, hex
    pub signature: String,
    pub nonce: String,
    pub chain_id: u64,
    pub domain: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    /// Bearer credential
    pub token: String,
    pub address: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub address: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/v1/auth/challenge",
    request_body = ChallengeRequest,
    tag = "Auth",
    responses(
        (status = 200, body = ChallengeResponse),
        (status = 400, body = crate::error::ErrorBody),
        (status = 401, body = crate::error::ErrorBody)
    )
)]
pub async fn challenge(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state.challenges.issue_challenge(
        &request.address,
        request.chain_id,
        &request.domain,
        Utc::now(),
    )?;

    Ok(Json(ChallengeResponse {
        success: true,
        nonce: challenge.nonce,
        message: challenge.message,
        domain: challenge.domain,
        expires_at: challenge.expires_at,
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    request_body = VerifyRequest,
    tag = "Auth",
    responses(
        (status = 200, body = VerifyResponse),
        (status = 401, body = crate::error::ErrorBody)
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let credential = state.verifier.verify(
        &request.address,
        &request.signature,
        &request.nonce,
        request.chain_id,
        &request.domain,
        Utc::now(),
    )?;

    Ok(Json(VerifyResponse {
        success: true,
        token: credential.token,
        address: credential.address.to_checksum(None),
        expires_at: credential.expires_at,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, body = MeResponse),
        (status = 401, body = crate::error::ErrorBody)
    )
)]
pub async fn me(Auth(user): Auth) -> Result<Json<MeResponse>, ApiError> {
    let timestamp = |secs: i64| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| ApiError::internal("Credential timestamp out of range"))
    };
    Ok(Json(MeResponse {
        address: user.address.to_checksum(None),
        issued_at: timestamp(user.issued_at)?,
        expires_at: timestamp(user.expires_at)?,
    }))
}
