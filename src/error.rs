// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::approval::ApprovalError;
use crate::auth::AuthError;
use crate::blockchain::{ChainClientError, TokenIdError};
use crate::session::password::PasswordError;
use crate::session::SessionError;
use crate::storage::StorageError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retry_after: Option<u64>,
}

/// Error body returned by every endpoint.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`
    pub success: bool,
    /// Machine-readable error code
    pub error: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn unprocessable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            retry_after: Some(retry_after_secs),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                format!("Too many requests, retry in {retry_after_secs}s"),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "Request failed");
        }
        let body = Json(ErrorBody {
            success: false,
            error: self.code.to_string(),
            message: self.message,
        });
        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_request", rejection.body_text())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(err.status_code(), err.error_code(), err.to_string())
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        let status = match &err {
            ApprovalError::SessionInvalid => StatusCode::UNAUTHORIZED,
            ApprovalError::SessionMismatch
            | ApprovalError::IdentityMismatch
            | ApprovalError::EducationIncomplete => StatusCode::FORBIDDEN,
            ApprovalError::ApproverMisconfigured(_)
            | ApprovalError::Signing(_)
            | ApprovalError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Operators get the detail in the logs, clients a stable message
        let message = match &err {
            ApprovalError::ApproverMisconfigured(_) => {
                "Approval signing is misconfigured on the server".to_string()
            }
            ApprovalError::Storage(_) => "Storage error".to_string(),
            _ => err.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "Approval failed");
        }
        Self::new(status, err.error_code(), message)
    }
}

impl From<TokenIdError> for ApiError {
    fn from(err: TokenIdError) -> Self {
        Self::unprocessable(err.error_code(), err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => {
                Self::unauthorized("session_invalid", "Claim session is missing or expired")
            }
            SessionError::IdentityMismatch { .. } => Self::new(
                StatusCode::FORBIDDEN,
                "identity_mismatch",
                "This claim session is bound to a different wallet",
            ),
            SessionError::Random => Self::internal(err.to_string()),
            SessionError::Storage(e) => e.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "Password hashing failed");
        Self::internal("Password hashing failed")
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(what) => Self::conflict(format!("{what} already exists")),
            other => {
                tracing::error!(error = %other, "Storage failure");
                Self::internal("Storage error")
            }
        }
    }
}

impl From<ChainClientError> for ApiError {
    fn from(err: ChainClientError) -> Self {
        match err {
            ChainClientError::TokenId(e) => e.into(),
            ChainClientError::InvalidTxHash(_) => Self::bad_request(err.to_string()),
            ChainClientError::ReceiptNotFound(_)
            | ChainClientError::TransactionReverted(_)
            | ChainClientError::NoMintEvent(_) => {
                Self::unprocessable("mint_not_found", err.to_string())
            }
            ChainClientError::InvalidRpcUrl(_)
            | ChainClientError::WrongChain { .. }
            | ChainClientError::Rpc(_) => {
                tracing::error!(error = %err, "Chain read failed");
                Self::new(StatusCode::BAD_GATEWAY, "chain_unavailable", "Chain read failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{validate, TokenIdSource};
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.code, "bad_request");

        let unp = ApiError::unprocessable("token_id_zero", "oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unp.message, "oops");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(
            body,
            r#"{"success":false,"error":"bad_request","message":"bad data"}"#
        );
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
    }

    #[test]
    fn approval_errors_map_to_statuses() {
        let cases = [
            (ApprovalError::SessionInvalid, StatusCode::UNAUTHORIZED),
            (ApprovalError::SessionMismatch, StatusCode::FORBIDDEN),
            (ApprovalError::IdentityMismatch, StatusCode::FORBIDDEN),
            (ApprovalError::EducationIncomplete, StatusCode::FORBIDDEN),
            (
                ApprovalError::ApproverMisconfigured("key".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let code = err.error_code();
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn password_failure_is_internal() {
        let api: ApiError = PasswordError::Random.into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code, "internal_error");
    }

    #[tokio::test]
    async fn json_rejection_keeps_status_and_envelope() {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let rejection = Json::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();
        let api: ApiError = rejection.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.code, "invalid_request");
    }

    #[test]
    fn zero_token_id_is_422_with_critical_message() {
        let err = validate("0", TokenIdSource::UserInput).unwrap_err();
        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.code, "token_id_zero");
        assert!(api.message.contains("CRITICAL"));
    }
}
