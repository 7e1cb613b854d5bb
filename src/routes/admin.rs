use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        admin::{AssignWinnerRequest, AssignWinnerResponse, BotCleanupReport, BotFillReport},
        common::TournamentSummary,
        matches::{ChangePromptResponse, VotingResult},
        tournament::{CreateTournamentRequest, SetAnonymousVotingRequest},
    },
    error::AppError,
    routes::user_id_from_headers,
    services::{match_service, profile_service, tournament_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints for running tournaments.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/tournaments", post(create_tournament))
        .route(
            "/admin/tournaments/current/anonymous-voting",
            put(set_anonymous_voting),
        )
        .route("/admin/tournaments/current/finish", post(force_finish))
        .route("/admin/tournaments/{id}/reset", post(reset_to_lobby))
        .route("/admin/tournaments/current/bots", post(fill_with_bots))
        .route("/admin/bots", delete(cleanup_bots))
        .route("/admin/matches/{id}/voting/end", post(end_voting))
        .route("/admin/matches/{id}/tie-break", post(resolve_tie))
        .route("/admin/matches/{id}/winner", post(assign_winner))
        .route("/admin/matches/{id}/prompt", put(change_prompt))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

/// Open a new tournament lobby.
#[utoipa::path(
    post,
    path = "/admin/tournaments",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("X-User-Id" = String, Header, description = "Identity of the creating admin")
    ),
    request_body = CreateTournamentRequest,
    responses(
        (status = 200, description = "Lobby opened", body = TournamentSummary),
        (status = 409, description = "A tournament is already open")
    )
)]
pub async fn create_tournament(
    State(state): State<SharedState>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<CreateTournamentRequest>,
) -> Result<Json<TournamentSummary>, AppError> {
    let created_by = user_id_from_headers(&headers)?;
    payload.validate()?;
    Ok(Json(
        tournament_service::create_tournament(&state, created_by, payload).await?,
    ))
}

/// Toggle identity hiding on the current tournament.
#[utoipa::path(
    put,
    path = "/admin/tournaments/current/anonymous-voting",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = SetAnonymousVotingRequest,
    responses((status = 200, description = "Setting updated", body = TournamentSummary))
)]
pub async fn set_anonymous_voting(
    State(state): State<SharedState>,
    Json(payload): Json<SetAnonymousVotingRequest>,
) -> Result<Json<TournamentSummary>, AppError> {
    Ok(Json(
        tournament_service::set_anonymous_voting(&state, payload.anonymous_voting).await?,
    ))
}

/// End the current tournament early without a champion.
#[utoipa::path(
    post,
    path = "/admin/tournaments/current/finish",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Tournament finished", body = TournamentSummary))
)]
pub async fn force_finish(
    State(state): State<SharedState>,
) -> Result<Json<TournamentSummary>, AppError> {
    Ok(Json(tournament_service::force_finish(&state).await?))
}

/// Return a tournament to an open lobby, discarding its bracket.
#[utoipa::path(
    post,
    path = "/admin/tournaments/{id}/reset",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("id" = String, Path, description = "Identifier of the tournament to reset")
    ),
    responses((status = 200, description = "Tournament reset to lobby", body = TournamentSummary))
)]
pub async fn reset_to_lobby(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TournamentSummary>, AppError> {
    Ok(Json(tournament_service::reset_to_lobby(&state, id).await?))
}

/// Pad the open lobby with bot players up to the tournament size.
#[utoipa::path(
    post,
    path = "/admin/tournaments/current/bots",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Lobby padded with bots", body = BotFillReport))
)]
pub async fn fill_with_bots(
    State(state): State<SharedState>,
) -> Result<Json<BotFillReport>, AppError> {
    Ok(Json(profile_service::fill_with_bots(&state).await?))
}

/// Delete bot accounts that are not seated in the open tournament.
#[utoipa::path(
    delete,
    path = "/admin/bots",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Cleanup report", body = BotCleanupReport))
)]
pub async fn cleanup_bots(
    State(state): State<SharedState>,
) -> Result<Json<BotCleanupReport>, AppError> {
    Ok(Json(profile_service::cleanup_bots(&state).await?))
}

/// Close the voting window of a match.
#[utoipa::path(
    post,
    path = "/admin/matches/{id}/voting/end",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses((status = 200, description = "Voting closed", body = VotingResult))
)]
pub async fn end_voting(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VotingResult>, AppError> {
    Ok(Json(match_service::end_voting(&state, id).await?))
}

/// Resolve a tied vote with a server-side coin toss.
#[utoipa::path(
    post,
    path = "/admin/matches/{id}/tie-break",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses((status = 200, description = "Tie resolved", body = VotingResult))
)]
pub async fn resolve_tie(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VotingResult>, AppError> {
    Ok(Json(match_service::resolve_tie(&state, id).await?))
}

/// Assign a match winner directly.
#[utoipa::path(
    post,
    path = "/admin/matches/{id}/winner",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    request_body = AssignWinnerRequest,
    responses(
        (status = 200, description = "Winner assigned", body = AssignWinnerResponse),
        (status = 409, description = "Winner already decided")
    )
)]
pub async fn assign_winner(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignWinnerRequest>,
) -> Result<Json<AssignWinnerResponse>, AppError> {
    match_service::assign_winner(&state, id, payload.winner_id).await?;
    Ok(Json(AssignWinnerResponse {
        match_id: id,
        winner_id: payload.winner_id,
    }))
}

/// Draw a fresh prompt for a match still in its submission phase.
#[utoipa::path(
    put,
    path = "/admin/matches/{id}/prompt",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("id" = String, Path, description = "Identifier of the match")
    ),
    responses(
        (status = 200, description = "Prompt replaced", body = ChangePromptResponse),
        (status = 409, description = "Match is past the submission phase")
    )
)]
pub async fn change_prompt(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChangePromptResponse>, AppError> {
    Ok(Json(match_service::change_prompt(&state, id).await?))
}

/// Gate admin routes behind either the SSE-issued admin token or the
/// identity of a user holding admin rights.
async fn require_admin(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(provided) = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        let expected = {
            let guard = state.admin_token().lock().await;
            guard.clone()
        };

        return match expected {
            Some(token) if token == provided => Ok(next.run(req).await),
            Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
            None => Err(AppError::Unauthorized(
                "admin SSE stream not initialised yet".into(),
            )),
        };
    }

    let user_id = user_id_from_headers(req.headers()).map_err(|_| {
        AppError::Unauthorized("provide `X-Admin-Token` or an admin `X-User-Id`".into())
    })?;

    let store = state.require_store().await.map_err(AppError::from)?;
    let user = store
        .find_user(user_id)
        .await
        .map_err(|err| AppError::from(crate::error::ServiceError::from(err)))?
        .ok_or_else(|| AppError::Unauthorized("unknown user".into()))?;

    if user.is_admin {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("admin rights required".into()))
    }
}
