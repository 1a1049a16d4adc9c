//! Per-resource-type endpoints: whoami, token status, sign out.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use warden_core::AuthContext;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{CurrentResource, authorization_header};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub resource_type: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatusResponse {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOutResponse {
    pub success: bool,
}

/// `GET /{resource_type}/me`
pub async fn me(Extension(current): Extension<CurrentResource>) -> Json<MeResponse> {
    Json(MeResponse {
        resource_type: current.resource_type,
        id: current.account.id.clone(),
    })
}

/// `GET /{resource_type}/token`: never answers 401; an unusable token is
/// just `valid: false`.
pub async fn token_status(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenStatusResponse>> {
    if !state.pipeline.registry().contains(&resource_type) {
        return Err(ApiError::NotFound(format!(
            "unknown resource type '{resource_type}'"
        )));
    }
    let header = authorization_header(&headers);
    let valid = state
        .pipeline
        .is_token_valid(header.as_deref(), &resource_type)
        .await?;
    Ok(Json(TokenStatusResponse { valid }))
}

/// `DELETE /{resource_type}/sign_out`
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Extension(current): Extension<CurrentResource>,
) -> ApiResult<Json<SignOutResponse>> {
    state.pipeline.logout(&ctx, &current.resource_type).await?;
    Ok(Json(SignOutResponse { success: true }))
}
