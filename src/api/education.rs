// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{enforce_rate_limit, ApiJson, ClientFingerprint, TokenIdInput};
use crate::{
    approval::ApprovalRequest,
    auth::{siwe::parse_address, Auth, AuthError, OptionalAuth},
    blockchain::{validate as validate_token_id, TokenIdSource},
    error::ApiError,
    rate_limit::RateLimitScope,
    state::AppState,
    storage::{EducationRecord, GiftRepository},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteEducationRequest {
    pub gift_id: u64,
    pub score: u32,
    pub answered: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteEducationResponse {
    pub success: bool,
    pub gift_id: u64,
    pub claimer: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub session_token: String,
    #[schema(value_type = String)]
    pub token_id: TokenIdInput,
    pub claimer: String,
    #[serde(default)]
    pub gift_id: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub questions_score: Option<u32>,
    #[serde(default)]
    pub questions_answered: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveResponse {
    pub success: bool,
    /// EIP-712 signature, 65 bytes hex
    pub signature: String,
    /// Unix seconds after which the gate rejects the approval
    pub deadline: u64,
    /// `signature ‖ uint256(deadline)`, hex
    pub gate_data: String,
    pub approval_id: String,
    pub gift_id: u64,
    /// `education` or `bypass`
    pub path: String,
}

/// Record that the signed-in wallet finished the gift's education flow.
#[utoipa::path(
    post,
    path = "/v1/education/complete",
    request_body = CompleteEducationRequest,
    tag = "Education",
    security(("bearer" = [])),
    responses(
        (status = 200, body = CompleteEducationResponse),
        (status = 401, body = crate::error::ErrorBody),
        (status = 404, body = crate::error::ErrorBody)
    )
)]
pub async fn complete(
    Auth(user): Auth,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CompleteEducationRequest>,
) -> Result<Json<CompleteEducationResponse>, ApiError> {
    let gifts = GiftRepository::new(state.store.as_ref());
    if gifts.get(request.gift_id)?.is_none() {
        return Err(ApiError::not_found("Gift not found"));
    }

    let record = EducationRecord {
        claimer: user.address,
        gift_id: request.gift_id,
        score: request.score,
        answered: request.answered,
        completed_at: Utc::now(),
    };
    gifts.record_education(&record)?;
    tracing::info!(
        gift_id = record.gift_id,
        claimer = %record.claimer,
        score = record.score,
        "Education completed"
    );

    Ok(Json(CompleteEducationResponse {
        success: true,
        gift_id: record.gift_id,
        claimer: record.claimer.to_checksum(None),
        completed_at: record.completed_at,
    }))
}

/// Issue an EIP-712 education approval for a claim session.
///
/// When a credential is sent its wallet must be the claimer.
#[utoipa::path(
    post,
    path = "/v1/education/approve",
    request_body = ApproveRequest,
    tag = "Education",
    responses(
        (status = 200, body = ApproveResponse),
        (status = 401, body = crate::error::ErrorBody),
        (status = 403, body = crate::error::ErrorBody),
        (status = 429, body = crate::error::ErrorBody),
        (status = 500, body = crate::error::ErrorBody)
    )
)]
pub async fn approve(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    fingerprint: ClientFingerprint,
    ApiJson(request): ApiJson<ApproveRequest>,
) -> Result<Json<ApproveResponse>, ApiError> {
    enforce_rate_limit(&state, RateLimitScope::Approval, &fingerprint)?;

    let token_id = validate_token_id(request.token_id, TokenIdSource::UserInput)?;
    let claimer = parse_address(&request.claimer)?;
    if let Some(user) = &user {
        if user.address != claimer {
            tracing::warn!(
                authenticated = %user.address,
                claimer = %claimer,
                "Approval requested for another wallet"
            );
            return Err(AuthError::CredentialMismatch.into());
        }
    }

    let grant = state.approvals.approve(
        &ApprovalRequest {
            session_token: request.session_token,
            token_id,
            claimer,
            gift_id: request.gift_id,
            email: request.email,
            questions_score: request.questions_score,
            questions_answered: request.questions_answered,
        },
        Utc::now(),
    )?;

    Ok(Json(ApproveResponse {
        success: true,
        signature: alloy::hex::encode_prefixed(grant.signature.as_bytes()),
        deadline: grant.deadline,
        gate_data: alloy::hex::encode_prefixed(&grant.gate_data),
        approval_id: grant.approval_id.to_string(),
        gift_id: grant.gift_id,
        path: grant.path.as_str().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::preclaim::tests::{fingerprint, register};
    use crate::api::preclaim::{validate, PreclaimRequest};
    use crate::approval::gate_data;
    use crate::auth::AuthenticatedUser;
    use crate::state::tests::test_state;
    use alloy::primitives::Address;
    use axum::http::StatusCode;

    fn user(address: Address) -> AuthenticatedUser {
        let now = Utc::now().timestamp();
        AuthenticatedUser {
            address,
            issued_at: now,
            expires_at: now + 3600,
        }
    }

    async fn open_session(state: &AppState) -> String {
        register(state, 7, 42, "hunter2");
        claim_session(state).await
    }

    async fn claim_session(state: &AppState) -> String {
        let Json(body) = validate(
            State(state.clone()),
            fingerprint(),
            ApiJson(PreclaimRequest {
                token_id: TokenIdInput::Unsigned(42),
                password: "hunter2".into(),
                claimer: None,
            }),
        )
        .await
        .unwrap();
        body.session_token
    }

    fn approve_request(session_token: &str, claimer: Address) -> ApproveRequest {
        ApproveRequest {
            session_token: session_token.to_string(),
            token_id: TokenIdInput::Text("42".into()),
            claimer: claimer.to_checksum(None),
            gift_id: Some(7),
            email: Some("a@b.c".into()),
            questions_score: Some(3),
            questions_answered: Some(3),
        }
    }

    #[tokio::test]
    async fn complete_then_approve_uses_education_path() {
        let state = test_state();
        let session = open_session(&state).await;
        let claimer = Address::repeat_byte(0x42);

        let Json(done) = complete(
            Auth(user(claimer)),
            State(state.clone()),
            ApiJson(CompleteEducationRequest {
                gift_id: 7,
                score: 3,
                answered: 3,
            }),
        )
        .await
        .unwrap();
        assert!(done.success);

        let Json(body) = approve(
            OptionalAuth(Some(user(claimer))),
            State(state.clone()),
            fingerprint(),
            ApiJson(approve_request(&session, claimer)),
        )
        .await
        .unwrap();

        assert!(body.success);
        assert_eq!(body.path, "education");
        assert_eq!(body.gift_id, 7);
        let blob = alloy::hex::decode(&body.gate_data).unwrap();
        let (signature, deadline) = gate_data::decode(&blob).unwrap();
        assert_eq!(deadline, body.deadline);
        assert_eq!(
            alloy::hex::encode_prefixed(signature.as_bytes()),
            body.signature
        );
    }

    #[tokio::test]
    async fn password_session_takes_bypass_path() {
        let state = test_state();
        let session = open_session(&state).await;

        let Json(body) = approve(
            OptionalAuth(None),
            State(state),
            fingerprint(),
            ApiJson(approve_request(&session, Address::repeat_byte(0x42))),
        )
        .await
        .unwrap();
        assert_eq!(body.path, "bypass");
    }

    #[tokio::test]
    async fn credential_must_match_claimer() {
        let state = test_state();
        let session = open_session(&state).await;

        let err = approve(
            OptionalAuth(Some(user(Address::repeat_byte(0x01)))),
            State(state),
            fingerprint(),
            ApiJson(approve_request(&session, Address::repeat_byte(0x42))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "credential_mismatch");
    }

    #[tokio::test]
    async fn preclaim_attempts_do_not_spend_approval_budget() {
        let state = test_state();
        register(&state, 7, 42, "hunter2");
        for _ in 0..4 {
            validate(
                State(state.clone()),
                fingerprint(),
                ApiJson(PreclaimRequest {
                    token_id: TokenIdInput::Unsigned(42),
                    password: "wrong".into(),
                    claimer: None,
                }),
            )
            .await
            .unwrap_err();
        }
        let session = claim_session(&state).await;

        let Json(body) = approve(
            OptionalAuth(None),
            State(state),
            fingerprint(),
            ApiJson(approve_request(&session, Address::repeat_byte(0x42))),
        )
        .await
        .unwrap();
        assert!(body.success);
    }

    #[tokio::test]
    async fn second_claimer_is_identity_mismatch() {
        let state = test_state();
        let session = open_session(&state).await;

        approve(
            OptionalAuth(None),
            State(state.clone()),
            fingerprint(),
            ApiJson(approve_request(&session, Address::repeat_byte(0x42))),
        )
        .await
        .unwrap();
        let err = approve(
            OptionalAuth(None),
            State(state),
            fingerprint(),
            ApiJson(approve_request(&session, Address::repeat_byte(0x43))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "identity_mismatch");
    }

    #[tokio::test]
    async fn unknown_session_is_unauthorized() {
        let err = approve(
            OptionalAuth(None),
            State(test_state()),
            fingerprint(),
            ApiJson(approve_request("missing", Address::repeat_byte(0x42))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "session_invalid");
    }

    #[tokio::test]
    async fn complete_requires_registered_gift() {
        let err = complete(
            Auth(user(Address::repeat_byte(0x42))),
            State(test_state()),
            ApiJson(CompleteEducationRequest {
                gift_id: 99,
                score: 1,
                answered: 1,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
