// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts},
    http::request::Parts,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::RawTokenId,
    error::{ApiError, ErrorBody},
    rate_limit::{client_fingerprint, RateLimitDecision, RateLimitScope},
    state::AppState,
    storage::GiftAnalytics,
};

pub mod auth;
pub mod education;
pub mod gifts;
pub mod health;
pub mod preclaim;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/challenge", post(auth::challenge))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/me", get(auth::me))
        .route("/preclaim/validate", post(preclaim::validate))
        .route("/education/complete", post(education::complete))
        .route("/education/approve", post(education::approve))
        .route("/gifts", post(gifts::register_gift))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

/// `ip|user-agent` of the caller, for rate limiting.
///
/// The peer address is only known when the server was started with
/// `into_make_service_with_connect_info`.
#[derive(Debug, Clone)]
pub struct ClientFingerprint(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientFingerprint {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_fingerprint(&parts.headers, peer)))
    }
}

/// JSON body whose rejections use the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Count one request against the caller's window for `scope`.
pub(crate) fn enforce_rate_limit(
    state: &AppState,
    scope: RateLimitScope,
    fingerprint: &ClientFingerprint,
) -> Result<(), ApiError> {
    match state.limiter.check(&scope.key(&fingerprint.0), Instant::now()) {
        RateLimitDecision::Allowed { .. } => Ok(()),
        RateLimitDecision::Limited { retry_after_secs } => {
            tracing::warn!(scope = scope.as_str(), retry_after_secs, "Rate limit exceeded");
            Err(ApiError::rate_limited(retry_after_secs))
        }
    }
}

/// Token id as clients send it: a JSON number or a decimal/hex string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TokenIdInput {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl From<TokenIdInput> for RawTokenId {
    fn from(value: TokenIdInput) -> Self {
        match value {
            TokenIdInput::Unsigned(v) => RawTokenId::Unsigned(v.into()),
            TokenIdInput::Signed(v) => RawTokenId::Signed(v.into()),
            TokenIdInput::Text(s) => RawTokenId::Text(s),
        }
    }
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::challenge,
        auth::verify,
        auth::me,
        preclaim::validate,
        education::complete,
        education::approve,
        gifts::register_gift
    ),
    components(
        schemas(
            ErrorBody,
            GiftAnalytics,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            auth::ChallengeRequest,
            auth::ChallengeResponse,
            auth::VerifyRequest,
            auth::VerifyResponse,
            auth::MeResponse,
            preclaim::PreclaimRequest,
            preclaim::PreclaimResponse,
            education::CompleteEducationRequest,
            education::CompleteEducationResponse,
            education::ApproveRequest,
            education::ApproveResponse,
            gifts::RegisterGiftRequest,
            gifts::RegisterGiftResponse
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Wallet sign-in"),
        (name = "Claims", description = "Pre-claim password check and claim sessions"),
        (name = "Education", description = "Education completion and approval signing"),
        (name = "Gifts", description = "Gift registration")
    )
)]
pub struct ApiDoc;
