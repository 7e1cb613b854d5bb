use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    common::{TournamentSummary, UserSummary},
    matches::MatchSnapshot,
    validation::validate_tournament_size,
};

/// Request body for creating a tournament lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTournamentRequest {
    /// Bracket size; must be a power of two between 2 and 32.
    #[validate(custom(function = validate_tournament_size))]
    pub tournament_size: u32,
    /// Language tag selecting the prompt pool ("en", "fr", ...).
    #[validate(length(min = 2, max = 16))]
    pub language: String,
    /// Hide player identities until each match reaches results.
    #[serde(default)]
    pub anonymous_voting: bool,
}

/// Request body toggling identity hiding on the current tournament.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetAnonymousVotingRequest {
    pub anonymous_voting: bool,
}

/// Full client-facing view of a tournament.
#[derive(Debug, Serialize, ToSchema)]
pub struct TournamentSnapshot {
    pub tournament: TournamentSummary,
    /// Participants in join order.
    pub participants: Vec<UserSummary>,
    /// All matches ordered by round then slot.
    pub matches: Vec<MatchSnapshot>,
    /// Winner of the final match once the tournament finished naturally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub champion: Option<UserSummary>,
}

/// Response for joining a tournament lobby.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub tournament_id: Uuid,
    /// Number of participants after this join.
    pub participant_count: u32,
    /// True when this join filled the lobby and started the bracket.
    pub started: bool,
}
