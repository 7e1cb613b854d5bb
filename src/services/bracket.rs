use std::time::SystemTime;

use rand::seq::SliceRandom;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        changes::{ChangeEvent, ChangeOp, Table},
        models::{MatchEntity, TournamentEntity, TournamentStatus, UserEntity},
    },
    error::ServiceError,
    services::sse_events::broadcast_change,
    state::{
        SharedState,
        machine::{FinishReason, TournamentEvent},
    },
};

/// What a bracket advancement attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// At least one match in the current round has no winner yet.
    RoundIncomplete,
    /// The next round (or the finish) was already produced by an earlier
    /// call; nothing was written.
    AlreadyAdvanced,
    /// A new round of matches was generated.
    NextRound {
        /// 1-based round number of the new matches.
        round: u32,
        /// Number of matches generated.
        matches: u32,
    },
    /// The final match completed; the tournament finished with this champion.
    Champion {
        /// Winner of the final match.
        winner_id: Uuid,
    },
}

/// Generate the first round from a full lobby.
///
/// Participants are shuffled, then paired in order; slot `i` takes shuffled
/// players `2i` and `2i+1`. Prompts are drawn from the tournament's language
/// pool avoiding repeats within the bracket.
pub fn generate_first_round(
    config: &AppConfig,
    tournament: &TournamentEntity,
    participants: &[UserEntity],
) -> Result<Vec<MatchEntity>, ServiceError> {
    if participants.len() != tournament.tournament_size as usize {
        return Err(ServiceError::InvalidInput(format!(
            "lobby holds {} of {} participants",
            participants.len(),
            tournament.tournament_size
        )));
    }

    let mut ids: Vec<Uuid> = participants.iter().map(|user| user.id).collect();
    ids.shuffle(&mut rand::rng());

    let mut used_prompts = Vec::new();
    let matches = pair_in_order(&ids)
        .into_iter()
        .enumerate()
        .map(|(slot, (player1_id, player2_id))| {
            let prompt = config.random_prompt(&tournament.language, &used_prompts);
            used_prompts.push(prompt.clone());
            MatchEntity {
                id: Uuid::new_v4(),
                tournament_id: tournament.id,
                round: 1,
                slot: slot as u32,
                player1_id,
                player2_id,
                prompt,
                winner_id: None,
                created_at: SystemTime::now(),
            }
        })
        .collect();

    Ok(matches)
}

/// Advance the bracket of `tournament_id` if its current round is complete.
///
/// Safe to call after every winner commit: an in-process gate serialises
/// callers, and the next round is only written when it does not exist yet,
/// so concurrent commits cannot duplicate matches.
pub async fn advance_bracket(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<AdvanceOutcome, ServiceError> {
    let _gate = state.advance_gate().lock().await;
    let store = state.require_store().await?;

    let matches = store.list_matches(tournament_id).await?;
    if matches.is_empty() {
        return Err(ServiceError::InvalidState(
            "tournament has no bracket yet".into(),
        ));
    }

    // Advance from the highest round holding a completed match; a round
    // above it is the output of an earlier advancement, not work to do.
    let Some(current_round) = matches
        .iter()
        .filter(|m| m.is_complete())
        .map(|m| m.round)
        .max()
    else {
        return Ok(AdvanceOutcome::RoundIncomplete);
    };

    let mut current: Vec<&MatchEntity> =
        matches.iter().filter(|m| m.round == current_round).collect();
    current.sort_by_key(|m| m.slot);

    if current.iter().any(|m| !m.is_complete()) {
        return Ok(AdvanceOutcome::RoundIncomplete);
    }

    if current.len() == 1 {
        return finish_with_champion(state, tournament_id, current[0]).await;
    }

    if matches.iter().any(|m| m.round == current_round + 1) {
        return Ok(AdvanceOutcome::AlreadyAdvanced);
    }

    let winners: Vec<Uuid> = current
        .iter()
        .filter_map(|m| m.winner_id)
        .collect();

    let tournament = store
        .find_tournament(tournament_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("tournament not found".into()))?;

    let used_prompts: Vec<String> = matches.iter().map(|m| m.prompt.clone()).collect();
    let mut used = used_prompts;
    let next_round = current_round + 1;
    let new_matches: Vec<MatchEntity> = pair_in_order(&winners)
        .into_iter()
        .enumerate()
        .map(|(slot, (player1_id, player2_id))| {
            let prompt = state.config().random_prompt(&tournament.language, &used);
            used.push(prompt.clone());
            MatchEntity {
                id: Uuid::new_v4(),
                tournament_id,
                round: next_round,
                slot: slot as u32,
                player1_id,
                player2_id,
                prompt,
                winner_id: None,
                created_at: SystemTime::now(),
            }
        })
        .collect();

    store.insert_matches(new_matches.clone()).await?;
    info!(
        %tournament_id,
        round = next_round,
        matches = new_matches.len(),
        "bracket advanced"
    );

    for game in &new_matches {
        broadcast_change(
            state,
            ChangeEvent::new(Table::Matches, ChangeOp::Insert, game.id)
                .in_tournament(tournament_id),
        );
    }

    Ok(AdvanceOutcome::NextRound {
        round: next_round,
        matches: new_matches.len() as u32,
    })
}

async fn finish_with_champion(
    state: &SharedState,
    tournament_id: Uuid,
    final_match: &MatchEntity,
) -> Result<AdvanceOutcome, ServiceError> {
    let winner_id = final_match
        .winner_id
        .ok_or_else(|| ServiceError::InvalidState("final match has no winner".into()))?;

    let store = state.require_store().await?;
    let tournament = store
        .find_tournament(tournament_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("tournament not found".into()))?;

    if tournament.status == TournamentStatus::Finished {
        return Ok(AdvanceOutcome::AlreadyAdvanced);
    }

    let work_store = store.clone();
    let mut finished = tournament.clone();
    finished.status = TournamentStatus::Finished;

    state
        .run_transition(
            TournamentEvent::Finish(FinishReason::ChampionDecided),
            move || async move {
                work_store.update_tournament(finished).await?;
                Ok(())
            },
        )
        .await?;

    info!(%tournament_id, %winner_id, "tournament finished with a champion");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Tournaments, ChangeOp::Update, tournament_id)
            .in_tournament(tournament_id),
    );

    Ok(AdvanceOutcome::Champion { winner_id })
}

/// Pair an ordered list of player ids into (player1, player2) tuples.
fn pair_in_order(ids: &[Uuid]) -> Vec<(Uuid, Uuid)> {
    ids.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn user(name: &str) -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            username: name.to_owned(),
            is_admin: false,
            is_bot: false,
            created_at: SystemTime::now(),
        }
    }

    fn lobby(size: u32) -> TournamentEntity {
        TournamentEntity {
            id: Uuid::new_v4(),
            status: TournamentStatus::Lobby,
            tournament_size: size,
            language: "en".to_owned(),
            anonymous_voting: false,
            admin_ended: false,
            created_by: Uuid::new_v4(),
            created_at: SystemTime::now(),
        }
    }

    #[test]
    fn pairing_preserves_slot_order() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let pairs = pair_in_order(&ids);
        assert_eq!(pairs, vec![(ids[0], ids[1]), (ids[2], ids[3])]);
    }

    #[test]
    fn first_round_places_every_participant_once() {
        let config = AppConfig::default();
        let tournament = lobby(8);
        let participants: Vec<UserEntity> = (0..8).map(|i| user(&format!("p{i}"))).collect();

        let matches = generate_first_round(&config, &tournament, &participants).unwrap();

        assert_eq!(matches.len(), 4);
        let mut seen: Vec<Uuid> = matches
            .iter()
            .flat_map(|m| [m.player1_id, m.player2_id])
            .collect();
        seen.sort();
        let mut expected: Vec<Uuid> = participants.iter().map(|u| u.id).collect();
        expected.sort();
        assert_eq!(seen, expected);

        let slots: Vec<u32> = matches.iter().map(|m| m.slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert!(matches.iter().all(|m| m.round == 1));
        assert!(matches.iter().all(|m| m.winner_id.is_none()));
    }

    #[test]
    fn first_round_prompts_do_not_repeat() {
        let config = AppConfig::default();
        let tournament = lobby(16);
        let participants: Vec<UserEntity> = (0..16).map(|i| user(&format!("p{i}"))).collect();

        let matches = generate_first_round(&config, &tournament, &participants).unwrap();
        let mut prompts: Vec<&String> = matches.iter().map(|m| &m.prompt).collect();
        prompts.sort();
        prompts.dedup();
        assert_eq!(prompts.len(), matches.len());
    }

    #[test]
    fn partial_lobby_cannot_generate_a_bracket() {
        let config = AppConfig::default();
        let tournament = lobby(8);
        let participants: Vec<UserEntity> = (0..5).map(|i| user(&format!("p{i}"))).collect();

        let err = generate_first_round(&config, &tournament, &participants).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
