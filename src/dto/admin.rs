use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Request body for assigning a match winner directly.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignWinnerRequest {
    /// Must be one of the two match players.
    pub winner_id: Uuid,
}

/// Report returned after padding a lobby with bot players.
#[derive(Debug, Serialize, ToSchema)]
pub struct BotFillReport {
    pub tournament_id: Uuid,
    /// Bots created and joined by this call.
    pub added: u32,
    /// Participant count after the fill.
    pub participant_count: u32,
    /// True when the fill completed the lobby and started the bracket.
    pub started: bool,
}

/// Report returned after deleting leftover bot accounts.
#[derive(Debug, Serialize, ToSchema)]
pub struct BotCleanupReport {
    /// Bot accounts deleted. Bots still playing in a live tournament are
    /// skipped.
    pub removed: u32,
    /// Bot accounts that could not be removed this pass.
    pub skipped: u32,
}

/// Response to an admin-assigned match winner.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignWinnerResponse {
    pub match_id: Uuid,
    pub winner_id: Uuid,
}
