//! Custom Axum extractors
//!
//! Bearer authentication (with per-owner rate limiting), admin checks and a
//! JSON body extractor whose rejections use the API error shape.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use botbrawl_orchestrator::Principal;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Authenticated Owner Extractor
// =============================================================================

/// The caller, resolved from `Authorization: Bearer <token>`
///
/// Every authenticated request counts against the owner's rate limit.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedOwner(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedOwner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::MissingToken)?;
        let principal = state.auth.authenticate(token).await?;
        state.rate_limiter.check_owner(&principal.owner_id).await?;
        Ok(Self(principal))
    }
}

// =============================================================================
// Admin Required Extractor
// =============================================================================

/// Extractor that requires an admin token
pub struct RequireAdmin(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthenticatedOwner(principal) = AuthenticatedOwner::from_request_parts(parts, state).await?;
        if !principal.admin {
            return Err(ApiError::AdminRequired);
        }
        Ok(Self(principal))
    }
}

// =============================================================================
// JSON Body Extractor
// =============================================================================

/// `Json<T>` with rejections mapped to `INVALID_REQUEST_BODY`
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::InvalidRequestBody(rejection.body_text()))?;
        Ok(Self(value))
    }
}
