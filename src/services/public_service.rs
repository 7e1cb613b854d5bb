use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, SubmissionEntity, TournamentEntity, UserEntity, VoteEntity},
    dto::{
        common::UserSummary,
        matches::{MatchPhase, MatchSnapshot, PlayerSlot, SubmissionView},
        tournament::TournamentSnapshot,
    },
    error::ServiceError,
    state::SharedState,
};

/// Snapshot of the current (non-finished) tournament, if any.
pub async fn current_snapshot(
    state: &SharedState,
) -> Result<Option<TournamentSnapshot>, ServiceError> {
    let store = state.require_store().await?;
    let Some(tournament) = store.current_tournament().await? else {
        return Ok(None);
    };
    Ok(Some(build_snapshot(state, tournament).await?))
}

/// Snapshot of a specific tournament, finished ones included.
pub async fn snapshot_by_id(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<TournamentSnapshot, ServiceError> {
    let store = state.require_store().await?;
    let tournament = store
        .find_tournament(tournament_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("tournament not found".into()))?;
    build_snapshot(state, tournament).await
}

async fn build_snapshot(
    state: &SharedState,
    tournament: TournamentEntity,
) -> Result<TournamentSnapshot, ServiceError> {
    let store = state.require_store().await?;

    let participants = store.list_participants(tournament.id).await?;
    let usernames: HashMap<Uuid, String> = participants
        .iter()
        .map(|user| (user.id, user.username.clone()))
        .collect();

    let matches = store.list_matches(tournament.id).await?;
    let mut snapshots = Vec::with_capacity(matches.len());
    for game in &matches {
        let submissions = store.list_submissions(game.id).await?;
        let votes = store.list_votes(game.id).await?;
        snapshots.push(match_snapshot(
            &tournament,
            game,
            submissions,
            &votes,
            &usernames,
        ));
    }

    let champion = champion_of(&tournament, &matches, &participants);

    Ok(TournamentSnapshot {
        tournament: tournament.into(),
        participants: participants.into_iter().map(Into::into).collect(),
        matches: snapshots,
        champion,
    })
}

/// Winner of the final round, present only when the tournament finished
/// naturally.
fn champion_of(
    tournament: &TournamentEntity,
    matches: &[MatchEntity],
    participants: &[UserEntity],
) -> Option<UserSummary> {
    if tournament.status != crate::dao::models::TournamentStatus::Finished
        || tournament.admin_ended
    {
        return None;
    }

    let final_round = matches.iter().map(|m| m.round).max()?;
    let finals: Vec<&MatchEntity> = matches.iter().filter(|m| m.round == final_round).collect();
    let winner_id = match finals.as_slice() {
        [last] => last.winner_id?,
        _ => return None,
    };

    participants
        .iter()
        .find(|user| user.id == winner_id)
        .cloned()
        .map(Into::into)
}

fn match_snapshot(
    tournament: &TournamentEntity,
    game: &MatchEntity,
    submissions: Vec<SubmissionEntity>,
    votes: &[VoteEntity],
    usernames: &HashMap<Uuid, String>,
) -> MatchSnapshot {
    let phase = MatchPhase::derive(submissions.len(), game.is_complete());
    // Identities stay hidden while anonymous voting is on and the match has
    // not reached results.
    let masked = tournament.anonymous_voting && phase != MatchPhase::Results;
    let reveal_votes = phase == MatchPhase::Results;

    let ordered = display_order(game.id, submissions);
    let submission_views = ordered
        .into_iter()
        .map(|submission| SubmissionView {
            id: submission.id,
            user_id: (!masked).then_some(submission.user_id),
            image_url: submission.image_url,
            votes: reveal_votes.then(|| {
                votes
                    .iter()
                    .filter(|vote| vote.submission_id == submission.id)
                    .count() as u64
            }),
            created_at: crate::dto::format_system_time(submission.created_at),
        })
        .collect();

    MatchSnapshot {
        id: game.id,
        round: game.round,
        slot: game.slot,
        phase,
        prompt: game.prompt.clone(),
        player1: player_slot(game.player1_id, masked, usernames),
        player2: player_slot(game.player2_id, masked, usernames),
        winner_id: game.winner_id,
        submissions: submission_views,
    }
}

fn player_slot(user_id: Uuid, masked: bool, usernames: &HashMap<Uuid, String>) -> PlayerSlot {
    if masked {
        return PlayerSlot {
            user_id: None,
            username: None,
        };
    }
    PlayerSlot {
        user_id: Some(user_id),
        username: usernames.get(&user_id).cloned(),
    }
}

/// Fix the left/right display order of a match's submissions.
///
/// Submissions are sorted by id, then flipped for odd match ids. The order
/// is a pure function of stored ids, so every client and every re-fetch
/// renders the images on the same side.
fn display_order(match_id: Uuid, mut submissions: Vec<SubmissionEntity>) -> Vec<SubmissionEntity> {
    submissions.sort_by_key(|submission| submission.id);
    if match_id.as_u128() & 1 == 1 {
        submissions.reverse();
    }
    submissions
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn submission(match_id: Uuid) -> SubmissionEntity {
        SubmissionEntity {
            id: Uuid::new_v4(),
            match_id,
            user_id: Uuid::new_v4(),
            image_url: "/uploads/test.png".into(),
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn display_order_is_deterministic() {
        let match_id = Uuid::new_v4();
        let a = submission(match_id);
        let b = submission(match_id);

        let forward = display_order(match_id, vec![a.clone(), b.clone()]);
        let backward = display_order(match_id, vec![b, a]);

        let forward_ids: Vec<Uuid> = forward.iter().map(|s| s.id).collect();
        let backward_ids: Vec<Uuid> = backward.iter().map(|s| s.id).collect();
        assert_eq!(forward_ids, backward_ids);
    }

    #[test]
    fn odd_match_ids_flip_the_sides() {
        let even = Uuid::from_u128(2);
        let odd = Uuid::from_u128(3);
        let a = submission(even);
        let b = submission(even);

        let even_order = display_order(even, vec![a.clone(), b.clone()]);
        let odd_order = display_order(odd, vec![a, b]);

        assert_eq!(even_order[0].id, odd_order[1].id);
        assert_eq!(even_order[1].id, odd_order[0].id);
    }
}
