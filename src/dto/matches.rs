use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Phase of a match, derived from its stored rows rather than persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Fewer than two images submitted; players are still creating.
    Submission,
    /// Both images in, winner not committed; spectators may vote.
    Voting,
    /// Winner committed; counts and identities are revealed.
    Results,
}

impl MatchPhase {
    /// Derive the phase from the submission count and winner column.
    pub fn derive(submission_count: usize, has_winner: bool) -> Self {
        if has_winner {
            MatchPhase::Results
        } else if submission_count >= 2 {
            MatchPhase::Voting
        } else {
            MatchPhase::Submission
        }
    }
}

/// One side of a match. Identity fields are absent while anonymous voting
/// hides them.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PlayerSlot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A submitted image as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SubmissionView {
    pub id: Uuid,
    /// Author, hidden while anonymous voting is active and the match is not
    /// in results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub image_url: String,
    /// Vote count; only revealed in the results phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u64>,
    pub created_at: String,
}

/// A bracket match with everything a client needs to render it.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct MatchSnapshot {
    pub id: Uuid,
    /// 1-based round number.
    pub round: u32,
    /// 0-based position within the round.
    pub slot: u32,
    pub phase: MatchPhase,
    pub prompt: String,
    pub player1: PlayerSlot,
    pub player2: PlayerSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<Uuid>,
    /// Submissions in their fixed display order.
    pub submissions: Vec<SubmissionView>,
}

/// Response returned after an image submission has been stored.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub match_id: Uuid,
    pub image_url: String,
}

/// Request body for casting a vote in a match.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// Submission the vote goes to; must belong to the match.
    pub submission_id: Uuid,
}

/// Response returned after a prompt replacement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChangePromptResponse {
    pub match_id: Uuid,
    pub prompt: String,
}

/// Outcome of closing the voting window on a match.
#[derive(Debug, Serialize, ToSchema)]
pub struct VotingResult {
    pub match_id: Uuid,
    /// Winner, absent when the vote ended in a tie awaiting a tie-break.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<Uuid>,
    pub tied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_follows_submissions_then_winner() {
        assert_eq!(MatchPhase::derive(0, false), MatchPhase::Submission);
        assert_eq!(MatchPhase::derive(1, false), MatchPhase::Submission);
        assert_eq!(MatchPhase::derive(2, false), MatchPhase::Voting);
        assert_eq!(MatchPhase::derive(2, true), MatchPhase::Results);
    }

    #[test]
    fn winner_forces_results_even_without_submissions() {
        // Admin-assigned winners skip the voting window entirely.
        assert_eq!(MatchPhase::derive(0, true), MatchPhase::Results);
    }
}
