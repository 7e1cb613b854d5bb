use axum::http::HeaderMap;
use uuid::Uuid;

use crate::{error::AppError, state::SharedState};

pub mod admin;
pub mod docs;
pub mod health;
pub mod matches;
pub mod profile;
pub mod sse;
pub mod tournament;

use axum::Router;

/// Header carrying the caller identity issued by the upstream identity
/// provider.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extract the authenticated user id from the request headers.
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing `X-User-Id` header".into()))?;

    Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest("`X-User-Id` is not a valid UUID".into()))
}

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(profile::router())
        .merge(tournament::router())
        .merge(matches::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
