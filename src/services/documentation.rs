use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the ImaginArena backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::tournament_stream,
        crate::routes::sse::admin_stream,
        crate::routes::profile::bootstrap_profile,
        crate::routes::profile::create_profile,
        crate::routes::tournament::current_tournament,
        crate::routes::tournament::tournament_by_id,
        crate::routes::tournament::join_current,
        crate::routes::matches::submit_image,
        crate::routes::matches::cast_vote,
        crate::routes::admin::create_tournament,
        crate::routes::admin::set_anonymous_voting,
        crate::routes::admin::force_finish,
        crate::routes::admin::reset_to_lobby,
        crate::routes::admin::fill_with_bots,
        crate::routes::admin::cleanup_bots,
        crate::routes::admin::end_voting,
        crate::routes::admin::resolve_tie,
        crate::routes::admin::assign_winner,
        crate::routes::admin::change_prompt,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::ChangeNotification,
            crate::dto::sse::SystemStatus,
            crate::dto::common::UserSummary,
            crate::dto::common::TournamentSummary,
            crate::dto::profile::CreateProfileRequest,
            crate::dto::profile::ProfileResponse,
            crate::dto::tournament::CreateTournamentRequest,
            crate::dto::tournament::SetAnonymousVotingRequest,
            crate::dto::tournament::TournamentSnapshot,
            crate::dto::tournament::JoinResponse,
            crate::dto::matches::MatchPhase,
            crate::dto::matches::MatchSnapshot,
            crate::dto::matches::PlayerSlot,
            crate::dto::matches::SubmissionView,
            crate::dto::matches::SubmissionResponse,
            crate::dto::matches::VoteRequest,
            crate::dto::matches::VotingResult,
            crate::dto::matches::ChangePromptResponse,
            crate::dto::admin::AssignWinnerRequest,
            crate::dto::admin::AssignWinnerResponse,
            crate::dto::admin::BotFillReport,
            crate::dto::admin::BotCleanupReport,
            crate::dao::models::TournamentStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "profile", description = "Profile bootstrap and creation"),
        (name = "tournaments", description = "Public tournament views and lobby joins"),
        (name = "matches", description = "Player submissions and spectator votes"),
        (name = "admin", description = "Tournament administration"),
    )
)]
pub struct ApiDoc;
