use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::get,
};
use validator::Validate;

use crate::{
    dto::profile::{CreateProfileRequest, ProfileResponse},
    error::AppError,
    routes::user_id_from_headers,
    services::profile_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    params(("X-User-Id" = String, Header, description = "Caller identity issued by the identity provider")),
    responses(
        (status = 200, description = "Profile of the authenticated user", body = ProfileResponse),
        (status = 404, description = "No profile exists for this user")
    )
)]
/// Fetch the caller's profile, used by clients at startup.
pub async fn bootstrap_profile(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    let user_id = user_id_from_headers(&headers)?;
    Ok(Json(
        profile_service::bootstrap_profile(&state, user_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/profile",
    tag = "profile",
    params(("X-User-Id" = String, Header, description = "Caller identity issued by the identity provider")),
    request_body = CreateProfileRequest,
    responses(
        (status = 200, description = "Profile created", body = ProfileResponse),
        (status = 409, description = "Username or profile already exists")
    )
)]
/// Create a profile for the caller with a unique username.
pub async fn create_profile(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user_id = user_id_from_headers(&headers)?;
    payload.validate()?;
    Ok(Json(
        profile_service::create_profile(&state, user_id, payload).await?,
    ))
}

/// Configure the profile routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/profile", get(bootstrap_profile).post(create_profile))
}
