// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{enforce_rate_limit, ApiJson, ClientFingerprint, TokenIdInput};
use crate::{
    auth::siwe::parse_address,
    blockchain::{validate as validate_token_id, TokenIdSource},
    error::ApiError,
    session::{password::verify_password, ClaimSession, ClaimerState},
    rate_limit::RateLimitScope,
    state::AppState,
    storage::GiftRepository,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreclaimRequest {
    /// Decimal or `0x` hex string, or a JSON number
    #[schema(value_type = String)]
    pub token_id: TokenIdInput,
    pub password: String,
    /// Wallet address, if already connected
    #[serde(default)]
    pub claimer: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreclaimResponse {
    pub success: bool,
    /// Opaque claim session token
    pub session_token: String,
    pub gift_id: u64,
    pub token_id: String,
    pub requires_education: bool,
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("invalid_gift_credentials", "Gift not found or password incorrect")
}

/// Check a gift password and open a claim session.
///
/// Unknown gifts and wrong passwords are indistinguishable to the caller.
#[utoipa::path(
    post,
    path = "/v1/preclaim/validate",
    request_body = PreclaimRequest,
    tag = "Claims",
    responses(
        (status = 200, body = PreclaimResponse),
        (status = 401, body = crate::error::ErrorBody),
        (status = 422, body = crate::error::ErrorBody),
        (status = 429, body = crate::error::ErrorBody)
    )
)]
pub async fn validate(
    State(state): State<AppState>,
    fingerprint: ClientFingerprint,
    ApiJson(request): ApiJson<PreclaimRequest>,
) -> Result<Json<PreclaimResponse>, ApiError> {
    enforce_rate_limit(&state, RateLimitScope::Preclaim, &fingerprint)?;

    let token_id = validate_token_id(request.token_id, TokenIdSource::UserInput)?;
    let claimer = match request.claimer.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => ClaimerState::Bound(parse_address(raw)?),
        _ => ClaimerState::Unbound,
    };

    let gifts = GiftRepository::new(state.store.as_ref());
    let gift = match gifts.gift_id_for_token(token_id)? {
        Some(gift_id) => gifts.get(gift_id)?,
        None => None,
    };
    let Some(gift) = gift else {
        tracing::info!(token_id = %token_id, "Pre-claim for unregistered token");
        return Err(invalid_credentials());
    };
    if !verify_password(&gift.password_salt, &gift.password_hash, &request.password) {
        tracing::info!(gift_id = gift.gift_id, "Pre-claim password rejected");
        return Err(invalid_credentials());
    }

    let session = ClaimSession {
        token_id,
        gift_id: gift.gift_id,
        claimer,
        password_validated: true,
        requires_education: gift.requires_education,
        created_at: Utc::now(),
    };
    let session_token = state.sessions.create(&session)?;

    tracing::info!(
        gift_id = gift.gift_id,
        token_id = %token_id,
        bound = claimer.address().is_some(),
        "Claim session opened"
    );

    Ok(Json(PreclaimResponse {
        success: true,
        session_token,
        gift_id: gift.gift_id,
        token_id: token_id.to_string(),
        requires_education: gift.requires_education,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blockchain::TokenId;
    use crate::session::password::hash_password;
    use crate::storage::GiftRecord;
    use crate::state::tests::test_state;
    use alloy::primitives::Address;
    use axum::http::StatusCode;

    pub(crate) fn fingerprint() -> ClientFingerprint {
        ClientFingerprint("198.51.100.4|test".to_string())
    }

    pub(crate) fn register(state: &AppState, gift_id: u64, token_id: u64, password: &str) {
        let digest = hash_password(password).unwrap();
        GiftRepository::new(state.store.as_ref())
            .register(&GiftRecord {
                gift_id,
                token_id: validate_token_id(token_id, TokenIdSource::UserInput).unwrap(),
                requires_education: true,
                password_salt: digest.salt,
                password_hash: digest.hash,
                creator: Address::repeat_byte(0xcc),
                registered_at: Utc::now(),
                analytics: None,
            })
            .unwrap();
    }

    fn request(token_id: TokenIdInput, password: &str) -> PreclaimRequest {
        PreclaimRequest {
            token_id,
            password: password.to_string(),
            claimer: None,
        }
    }

    #[tokio::test]
    async fn correct_password_opens_session() {
        let state = test_state();
        register(&state, 7, 42, "hunter2");

        let Json(body) = validate(
            State(state.clone()),
            fingerprint(),
            ApiJson(request(TokenIdInput::Text("0x2a".into()), "hunter2")),
        )
        .await
        .unwrap();

        assert!(body.success);
        assert_eq!(body.gift_id, 7);
        assert_eq!(body.token_id, "42");
        let session = state.sessions.get(&body.session_token).unwrap().unwrap();
        assert!(session.password_validated);
        assert_eq!(session.claimer, ClaimerState::Unbound);
        assert_eq!(session.token_id, TokenId::try_from("42".to_string()).unwrap());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_token_look_the_same() {
        let state = test_state();
        register(&state, 7, 42, "hunter2");

        let wrong = validate(
            State(state.clone()),
            fingerprint(),
            ApiJson(request(TokenIdInput::Unsigned(42), "nope")),
        )
        .await
        .unwrap_err();
        let unknown = validate(
            State(state),
            fingerprint(),
            ApiJson(request(TokenIdInput::Unsigned(43), "hunter2")),
        )
        .await
        .unwrap_err();

        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.code, unknown.code);
        assert_eq!(wrong.message, unknown.message);
    }

    #[tokio::test]
    async fn zero_token_id_is_critical() {
        let err = validate(
            State(test_state()),
            fingerprint(),
            ApiJson(request(TokenIdInput::Unsigned(0), "x")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.contains("CRITICAL"));
    }

    #[tokio::test]
    async fn connected_wallet_binds_session() {
        let state = test_state();
        register(&state, 7, 42, "hunter2");
        let claimer = Address::repeat_byte(0x42);

        let Json(body) = validate(
            State(state.clone()),
            fingerprint(),
            ApiJson(PreclaimRequest {
                token_id: TokenIdInput::Text("42".into()),
                password: "hunter2".into(),
                claimer: Some(format!("{claimer:#x}")),
            }),
        )
        .await
        .unwrap();

        let session = state.sessions.get(&body.session_token).unwrap().unwrap();
        assert_eq!(session.claimer, ClaimerState::Bound(claimer));
    }
}
