//! Bearer guard: authenticates the request as the resource type named in
//! the path and exposes the result to handlers.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use warden_core::AuthContext;
use warden_core::models::Account;

use crate::AppState;
use crate::error::ApiError;

/// The account a guarded route authenticated, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentResource {
    pub resource_type: String,
    pub account: Arc<Account>,
}

/// The `Authorization` header as text. Bytes outside visible ASCII are kept
/// (lossily) so a malformed credential fails verification instead of reading
/// as absent.
pub(crate) fn authorization_header(headers: &HeaderMap) -> Option<Cow<'_, str>> {
    headers.get(AUTHORIZATION).map(|v| match v.to_str() {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => String::from_utf8_lossy(v.as_bytes()),
    })
}

/// Axum route layer: authenticates `Authorization: Bearer <token>` as
/// `{resource_type}` and injects [`CurrentResource`] plus the request's
/// [`AuthContext`] into request extensions.
///
/// A context already present in the extensions is reused, so stacked
/// guards share one decode and one binding per type.
pub async fn require_resource(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.pipeline.registry().contains(&resource_type) {
        return Err(ApiError::NotFound(format!(
            "unknown resource type '{resource_type}'"
        )));
    }

    let mut ctx = match request.extensions_mut().remove::<AuthContext>() {
        Some(ctx) => ctx,
        None => {
            let header = authorization_header(request.headers());
            AuthContext::from_authorization_header(header.as_deref())
        }
    };

    let account = state
        .pipeline
        .authenticate_and_set(&mut ctx, &resource_type)
        .await?;

    request.extensions_mut().insert(ctx);
    request.extensions_mut().insert(CurrentResource {
        resource_type,
        account,
    });

    Ok(next.run(request).await)
}
