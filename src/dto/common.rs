use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{TournamentEntity, TournamentStatus, UserEntity},
    dto::format_system_time,
};

/// Public view of a user profile.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub is_bot: bool,
}

impl From<UserEntity> for UserSummary {
    fn from(user: UserEntity) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            is_bot: user.is_bot,
        }
    }
}

/// Public view of a tournament row.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct TournamentSummary {
    pub id: Uuid,
    pub status: TournamentStatus,
    /// Bracket size the lobby fills up to.
    pub tournament_size: u32,
    /// Language tag selecting the prompt pool.
    pub language: String,
    pub anonymous_voting: bool,
    /// True when an administrator ended the tournament before a champion.
    pub admin_ended: bool,
    pub created_by: Uuid,
    pub created_at: String,
}

impl From<TournamentEntity> for TournamentSummary {
    fn from(tournament: TournamentEntity) -> Self {
        Self {
            id: tournament.id,
            status: tournament.status,
            tournament_size: tournament.tournament_size,
            language: tournament.language,
            anonymous_voting: tournament.anonymous_voting,
            admin_ended: tournament.admin_ended,
            created_by: tournament.created_by,
            created_at: format_system_time(tournament.created_at),
        }
    }
}
