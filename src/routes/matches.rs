use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{
    dto::matches::{SubmissionResponse, VoteRequest},
    error::AppError,
    routes::user_id_from_headers,
    services::match_service,
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/matches/{id}/submission",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Caller identity issued by the identity provider"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    request_body(content = Vec<u8>, content_type = "image/png"),
    responses(
        (status = 200, description = "Image stored", body = SubmissionResponse),
        (status = 409, description = "Image already submitted for this match")
    )
)]
/// Submit the image for the caller's side of a match. The raw request body
/// is the image payload.
pub async fn submit_image(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmissionResponse>, AppError> {
    let user_id = user_id_from_headers(&headers)?;
    Ok(Json(
        match_service::submit_image(&state, user_id, id, body.to_vec()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/matches/{id}/vote",
    tag = "matches",
    params(
        ("X-User-Id" = String, Header, description = "Caller identity issued by the identity provider"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    request_body = VoteRequest,
    responses(
        (status = 204, description = "Vote recorded"),
        (status = 409, description = "Already voted in this match")
    )
)]
/// Cast a vote for one of the two submissions of a match.
pub async fn cast_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<VoteRequest>,
) -> Result<StatusCode, AppError> {
    let user_id = user_id_from_headers(&headers)?;
    match_service::cast_vote(&state, user_id, id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Configure the player-facing match routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/matches/{id}/submission", post(submit_image))
        .route("/matches/{id}/vote", post(cast_vote))
}
