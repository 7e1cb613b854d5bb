use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::tournament::{JoinResponse, TournamentSnapshot},
    error::AppError,
    routes::user_id_from_headers,
    services::{public_service, tournament_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/tournaments/current",
    tag = "tournaments",
    responses(
        (status = 200, description = "Snapshot of the current tournament", body = TournamentSnapshot),
        (status = 404, description = "No open tournament")
    )
)]
/// Full snapshot of the current tournament: lobby, bracket, submissions and
/// revealed vote counts.
pub async fn current_tournament(
    State(state): State<SharedState>,
) -> Result<Json<TournamentSnapshot>, AppError> {
    let snapshot = public_service::current_snapshot(&state)
        .await?
        .ok_or_else(|| AppError::NotFound("no open tournament".into()))?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/tournaments/{id}",
    tag = "tournaments",
    params(("id" = String, Path, description = "Identifier of the tournament")),
    responses(
        (status = 200, description = "Snapshot of the tournament", body = TournamentSnapshot),
        (status = 404, description = "Unknown tournament")
    )
)]
/// Snapshot of any tournament by id, finished ones included.
pub async fn tournament_by_id(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TournamentSnapshot>, AppError> {
    Ok(Json(public_service::snapshot_by_id(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/tournaments/current/join",
    tag = "tournaments",
    params(("X-User-Id" = String, Header, description = "Caller identity issued by the identity provider")),
    responses(
        (status = 200, description = "Joined the lobby", body = JoinResponse),
        (status = 409, description = "Already joined"),
    )
)]
/// Join the open lobby. The join that fills the lobby starts the bracket.
pub async fn join_current(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<JoinResponse>, AppError> {
    let user_id = user_id_from_headers(&headers)?;
    Ok(Json(
        tournament_service::join_current(&state, user_id).await?,
    ))
}

/// Configure the public tournament routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/tournaments/current", get(current_tournament))
        .route("/tournaments/current/join", post(join_current))
        .route("/tournaments/{id}", get(tournament_by_id))
}
