// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::Address;
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiJson;
use crate::{
    auth::Auth,
    blockchain::{assert_valid_token_id, decode_transfer_log, parse_topics, TokenId},
    error::ApiError,
    session::password::hash_password,
    state::AppState,
    storage::{GiftRecord, GiftRepository},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterGiftRequest {
    pub gift_id: u64,
    pub password: String,
    #[serde(default)]
    pub requires_education: bool,
    /// Topics of the mint's Transfer log, hex
    #[serde(default)]
    pub transfer_topics: Option<Vec<String>>,
    /// Mint transaction, read from the configured chain
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterGiftResponse {
    pub success: bool,
    pub gift_id: u64,
    pub token_id: String,
}

fn not_minted_by(creator: Address) -> ApiError {
    tracing::warn!(creator = %creator, "Gift registration for a mint the caller does not own");
    ApiError::new(
        StatusCode::FORBIDDEN,
        "not_gift_creator",
        "The mint was not made by or for the signed-in wallet",
    )
}

/// Resolve the token id of `creator`'s mint.
///
/// A receipt counts when the creator sent the mint transaction or received
/// the token. Client-supplied topics cannot be checked against the chain, so
/// they are only taken when no chain reader is configured, and must be a
/// mint to the creator.
async fn minted_token_id(
    state: &AppState,
    request: &RegisterGiftRequest,
    creator: Address,
) -> Result<TokenId, ApiError> {
    match (&request.transfer_topics, &request.tx_hash) {
        (Some(topics), None) => {
            if state.mints.is_some() {
                return Err(ApiError::bad_request(
                    "transferTopics are not accepted when the chain is readable, send txHash",
                ));
            }
            let transfer = decode_transfer_log(&parse_topics(topics)?)?;
            if !transfer.is_mint() || transfer.to != creator {
                return Err(not_minted_by(creator));
            }
            Ok(transfer.token_id)
        }
        (None, Some(tx_hash)) => {
            let mints = state
                .mints
                .as_ref()
                .ok_or_else(|| ApiError::service_unavailable("No chain reader is configured"))?;
            let mint = mints
                .client
                .mint_token_id(tx_hash, mints.nft_contract)
                .await?;
            if mint.sender != creator && mint.transfer.to != creator {
                return Err(not_minted_by(creator));
            }
            Ok(mint.transfer.token_id)
        }
        _ => Err(ApiError::bad_request(
            "Provide exactly one of transferTopics or txHash",
        )),
    }
}

/// Register a minted gift with its claim password.
#[utoipa::path(
    post,
    path = "/v1/gifts",
    request_body = RegisterGiftRequest,
    tag = "Gifts",
    security(("bearer" = [])),
    responses(
        (status = 201, body = RegisterGiftResponse),
        (status = 400, body = crate::error::ErrorBody),
        (status = 403, body = crate::error::ErrorBody),
        (status = 409, body = crate::error::ErrorBody),
        (status = 422, body = crate::error::ErrorBody)
    )
)]
pub async fn register_gift(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterGiftRequest>,
) -> Result<(StatusCode, Json<RegisterGiftResponse>), ApiError> {
    if request.password.is_empty() {
        return Err(ApiError::bad_request("Password must not be empty"));
    }

    let extracted = minted_token_id(&state, &request, user.address).await?;
    let token_id = assert_valid_token_id(extracted.get(), "gift registration")?;

    let digest = hash_password(&request.password)?;
    let gift = GiftRecord {
        gift_id: request.gift_id,
        token_id,
        requires_education: request.requires_education,
        password_salt: digest.salt,
        password_hash: digest.hash,
        creator: user.address,
        registered_at: Utc::now(),
        analytics: None,
    };
    GiftRepository::new(state.store.as_ref()).register(&gift)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterGiftResponse {
            success: true,
            gift_id: gift.gift_id,
            token_id: token_id.to_string(),
        }),
    ))
}
