use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Bracket sizes a tournament may be created with.
pub const ALLOWED_TOURNAMENT_SIZES: [u32; 5] = [2, 4, 8, 16, 32];

/// Lifecycle status of a tournament, persisted on the tournament row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Accepting participants until the configured size is reached.
    Lobby,
    /// Bracket generated, matches being played.
    InProgress,
    /// Champion decided or ended by an admin.
    Finished,
}

/// A registered player (or bot) account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntity {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub is_bot: bool,
    pub created_at: SystemTime,
}

/// A tournament row. Exactly one non-finished tournament is "current".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentEntity {
    pub id: Uuid,
    pub status: TournamentStatus,
    pub tournament_size: u32,
    pub language: String,
    pub anonymous_voting: bool,
    pub admin_ended: bool,
    pub created_by: Uuid,
    pub created_at: SystemTime,
}

/// Membership of a user in a tournament; the pair is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantEntity {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: SystemTime,
}

/// A single bracket match. `slot` is the 0-based position within the
/// round and defines the pairing order for the next round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEntity {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub round: u32,
    pub slot: u32,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub prompt: String,
    pub winner_id: Option<Uuid>,
    pub created_at: SystemTime,
}

impl MatchEntity {
    /// Whether `user_id` plays in this match.
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.player1_id == user_id || self.player2_id == user_id
    }

    /// A match is complete exactly when its winner has been committed.
    pub fn is_complete(&self) -> bool {
        self.winner_id.is_some()
    }
}

/// An image submitted by a participant for a match; one per (match, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEntity {
    pub id: Uuid,
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub created_at: SystemTime,
}

/// A spectator vote for one submission; one per (match, voter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteEntity {
    pub id: Uuid,
    pub match_id: Uuid,
    pub voter_id: Uuid,
    pub submission_id: Uuid,
    pub created_at: SystemTime,
}
