//! End-to-end tournament runs against the in-memory storage backend.

use std::sync::Arc;
use std::time::SystemTime;

use uuid::Uuid;

use imaginarena_back::{
    config::AppConfig,
    dao::{
        blob::FsBlobStore,
        models::{MatchEntity, ParticipantEntity, TournamentStatus},
        store::memory::MemoryTournamentStore,
    },
    dto::{
        matches::{MatchPhase, VoteRequest},
        profile::CreateProfileRequest,
        tournament::CreateTournamentRequest,
    },
    error::ServiceError,
    services::{
        bracket::{self, AdvanceOutcome},
        match_service, profile_service, public_service, tournament_service,
    },
    state::{AppState, SharedState},
};

async fn test_state() -> SharedState {
    let blob = Arc::new(FsBlobStore::new(
        std::env::temp_dir().join(format!("imaginarena-test-{}", Uuid::new_v4())),
        "/uploads".to_owned(),
    ));
    let state = AppState::new(AppConfig::default(), blob);
    state
        .install_store(Arc::new(MemoryTournamentStore::new()))
        .await;
    state
}

async fn create_player(state: &SharedState, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    profile_service::create_profile(
        state,
        id,
        CreateProfileRequest {
            username: username.to_owned(),
        },
    )
    .await
    .unwrap();
    id
}

fn tournament_request(tournament_size: u32, anonymous_voting: bool) -> CreateTournamentRequest {
    CreateTournamentRequest {
        tournament_size,
        language: "en".to_owned(),
        anonymous_voting,
    }
}

async fn list_matches(state: &SharedState, tournament_id: Uuid) -> Vec<MatchEntity> {
    let store = state.require_store().await.unwrap();
    store.list_matches(tournament_id).await.unwrap()
}

/// Both players submit, the spectator votes for player1's image, and voting
/// ends. Returns the winner, which is always player1 of the match.
async fn play_match(state: &SharedState, game: &MatchEntity, voter: Uuid) -> Uuid {
    let favourite =
        match_service::submit_image(state, game.player1_id, game.id, vec![0xAA; 64])
            .await
            .unwrap();
    match_service::submit_image(state, game.player2_id, game.id, vec![0xBB; 64])
        .await
        .unwrap();

    match_service::cast_vote(
        state,
        voter,
        game.id,
        VoteRequest {
            submission_id: favourite.id,
        },
    )
    .await
    .unwrap();

    let result = match_service::end_voting(state, game.id).await.unwrap();
    assert!(!result.tied);
    assert_eq!(result.winner_id, Some(game.player1_id));
    game.player1_id
}

#[tokio::test]
async fn full_bracket_produces_a_champion() {
    let state = test_state().await;
    let admin = Uuid::new_v4();
    let voter = create_player(&state, "spectator").await;

    let summary = tournament_service::create_tournament(&state, admin, tournament_request(4, false))
        .await
        .unwrap();
    assert_eq!(summary.status, TournamentStatus::Lobby);

    let mut started_flags = Vec::new();
    for i in 0..4 {
        let player = create_player(&state, &format!("player{i}")).await;
        let join = tournament_service::join_current(&state, player).await.unwrap();
        started_flags.push(join.started);
    }
    // Only the join that fills the lobby starts the bracket.
    assert_eq!(started_flags, vec![false, false, false, true]);

    let round1 = list_matches(&state, summary.id).await;
    assert_eq!(round1.len(), 2);
    assert!(round1.iter().all(|m| m.round == 1));

    for game in &round1 {
        play_match(&state, game, voter).await;
    }

    let all = list_matches(&state, summary.id).await;
    assert_eq!(all.len(), 3);
    let final_match = all.iter().find(|m| m.round == 2).unwrap();
    let champion = play_match(&state, final_match, voter).await;

    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    assert_eq!(snapshot.tournament.status, TournamentStatus::Finished);
    assert!(!snapshot.tournament.admin_ended);
    assert_eq!(snapshot.champion.unwrap().id, champion);

    // A finished tournament no longer shows up as current.
    assert!(public_service::current_snapshot(&state).await.unwrap().is_none());
}

#[tokio::test]
async fn sixteen_player_bracket_runs_to_a_champion() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(16, false))
            .await
            .unwrap();

    let mut players = Vec::new();
    for i in 0..16 {
        let player = create_player(&state, &format!("player{i:02}")).await;
        let join = tournament_service::join_current(&state, player).await.unwrap();
        assert_eq!(join.started, i == 15);
        players.push(player);
    }

    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    assert_eq!(snapshot.tournament.status, TournamentStatus::InProgress);

    let round1 = list_matches(&state, summary.id).await;
    assert_eq!(round1.len(), 8);
    // Every participant is seated in exactly one round-1 match.
    let mut seated: Vec<Uuid> = round1
        .iter()
        .flat_map(|m| [m.player1_id, m.player2_id])
        .collect();
    seated.sort();
    let mut expected = players.clone();
    expected.sort();
    assert_eq!(seated, expected);

    let mut round = 1;
    let mut expected_matches = 8;
    loop {
        let games: Vec<MatchEntity> = list_matches(&state, summary.id)
            .await
            .into_iter()
            .filter(|m| m.round == round)
            .collect();
        assert_eq!(games.len(), expected_matches);

        for game in &games {
            let favourite =
                match_service::submit_image(&state, game.player1_id, game.id, vec![0xAA; 32])
                    .await
                    .unwrap();
            match_service::submit_image(&state, game.player2_id, game.id, vec![0xBB; 32])
                .await
                .unwrap();

            // Everyone outside this match votes for player1's image.
            let mut ballots = 0;
            for voter in players.iter().filter(|id| !game.involves(**id)) {
                match_service::cast_vote(
                    &state,
                    *voter,
                    game.id,
                    VoteRequest {
                        submission_id: favourite.id,
                    },
                )
                .await
                .unwrap();
                ballots += 1;
            }
            assert_eq!(ballots, 14);

            let result = match_service::end_voting(&state, game.id).await.unwrap();
            assert!(!result.tied);
            assert_eq!(result.winner_id, Some(game.player1_id));
        }

        if expected_matches == 1 {
            break;
        }

        // Winners pair in slot order in the next round.
        let next: Vec<MatchEntity> = list_matches(&state, summary.id)
            .await
            .into_iter()
            .filter(|m| m.round == round + 1)
            .collect();
        assert_eq!(next.len(), expected_matches / 2);
        for (slot, pairing) in next.iter().enumerate() {
            assert_eq!(pairing.player1_id, games[2 * slot].player1_id);
            assert_eq!(pairing.player2_id, games[2 * slot + 1].player1_id);
        }

        round += 1;
        expected_matches /= 2;
    }

    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    assert_eq!(snapshot.tournament.status, TournamentStatus::Finished);
    let champion = snapshot.champion.unwrap();
    assert!(players.contains(&champion.id));
}

#[tokio::test]
async fn duplicate_join_is_rejected() {
    let state = test_state().await;
    tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
        .await
        .unwrap();

    let player = create_player(&state, "repeat_joiner").await;
    tournament_service::join_current(&state, player).await.unwrap();
    let err = tournament_service::join_current(&state, player)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn overfull_lobby_still_starts_and_seats_the_first_joiners() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();

    let alice = create_player(&state, "alice").await;
    tournament_service::join_current(&state, alice).await.unwrap();

    // A join that raced past the lobby check lands its row before capacity
    // is re-examined.
    let gatecrasher = create_player(&state, "gatecrasher").await;
    let store = state.require_store().await.unwrap();
    store
        .add_participant(ParticipantEntity {
            tournament_id: summary.id,
            user_id: gatecrasher,
            joined_at: SystemTime::now(),
        })
        .await
        .unwrap();

    let bob = create_player(&state, "bob").await;
    let join = tournament_service::join_current(&state, bob).await.unwrap();
    assert_eq!(join.participant_count, 3);
    assert!(join.started);

    // The bracket seats the first two joiners; the overflow row stays on the
    // roster without blocking the start.
    let games = list_matches(&state, summary.id).await;
    assert_eq!(games.len(), 1);
    let mut seated = [games[0].player1_id, games[0].player2_id];
    seated.sort();
    let mut expected = [alice, gatecrasher];
    expected.sort();
    assert_eq!(seated, expected);

    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    assert_eq!(snapshot.tournament.status, TournamentStatus::InProgress);
}

#[tokio::test]
async fn joining_requires_a_profile() {
    let state = test_state().await;
    tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
        .await
        .unwrap();

    let err = tournament_service::join_current(&state, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn only_one_open_tournament_at_a_time() {
    let state = test_state().await;
    tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
        .await
        .unwrap();

    let err =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(8, false))
            .await
            .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn players_cannot_submit_twice_or_vote_for_themselves() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();

    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    let join = tournament_service::join_current(&state, bob).await.unwrap();
    assert!(join.started);

    let game = list_matches(&state, summary.id).await.remove(0);

    let first = match_service::submit_image(&state, game.player1_id, game.id, vec![1; 16])
        .await
        .unwrap();
    let err = match_service::submit_image(&state, game.player1_id, game.id, vec![2; 16])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    match_service::submit_image(&state, game.player2_id, game.id, vec![3; 16])
        .await
        .unwrap();

    // Both players are barred from voting in their own match.
    let err = match_service::cast_vote(
        &state,
        game.player1_id,
        game.id,
        VoteRequest {
            submission_id: first.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn spectators_vote_once_per_match() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();

    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    let voter = create_player(&state, "spectator").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    tournament_service::join_current(&state, bob).await.unwrap();

    let game = list_matches(&state, summary.id).await.remove(0);
    let submission = match_service::submit_image(&state, game.player1_id, game.id, vec![1; 16])
        .await
        .unwrap();
    match_service::submit_image(&state, game.player2_id, game.id, vec![2; 16])
        .await
        .unwrap();

    let ballot = VoteRequest {
        submission_id: submission.id,
    };
    match_service::cast_vote(&state, voter, game.id, VoteRequest { ..ballot })
        .await
        .unwrap();
    let err = match_service::cast_vote(&state, voter, game.id, ballot)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn tied_votes_wait_for_the_coin_toss() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();

    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    tournament_service::join_current(&state, bob).await.unwrap();

    let game = list_matches(&state, summary.id).await.remove(0);
    match_service::submit_image(&state, game.player1_id, game.id, vec![1; 16])
        .await
        .unwrap();
    match_service::submit_image(&state, game.player2_id, game.id, vec![2; 16])
        .await
        .unwrap();

    // Zero votes on both sides is a tie, not a walkover.
    let result = match_service::end_voting(&state, game.id).await.unwrap();
    assert!(result.tied);
    assert_eq!(result.winner_id, None);
    let stored = list_matches(&state, summary.id).await.remove(0);
    assert_eq!(stored.winner_id, None);

    let tossed = match_service::resolve_tie(&state, game.id).await.unwrap();
    let winner = tossed.winner_id.unwrap();
    assert!(winner == game.player1_id || winner == game.player2_id);

    // The sole match was the final, so the coin toss crowned the champion.
    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    assert_eq!(snapshot.tournament.status, TournamentStatus::Finished);
    assert_eq!(snapshot.champion.unwrap().id, winner);
}

#[tokio::test]
async fn prompt_changes_stop_once_voting_opens() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();
    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    tournament_service::join_current(&state, bob).await.unwrap();

    let game = list_matches(&state, summary.id).await.remove(0);

    // While submissions are open a fresh prompt may be drawn.
    let replaced = match_service::change_prompt(&state, game.id).await.unwrap();
    assert_ne!(replaced.prompt, game.prompt);

    match_service::submit_image(&state, game.player1_id, game.id, vec![1; 16])
        .await
        .unwrap();
    match_service::submit_image(&state, game.player2_id, game.id, vec![2; 16])
        .await
        .unwrap();

    // Both images are in: the prompt the players worked against is locked.
    let err = match_service::change_prompt(&state, game.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    let stored = list_matches(&state, summary.id).await.remove(0);
    assert_eq!(stored.prompt, replaced.prompt);
}

#[tokio::test]
async fn advance_is_idempotent_per_round() {
    let state = test_state().await;
    let voter = create_player(&state, "spectator").await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
            .await
            .unwrap();
    for i in 0..4 {
        let player = create_player(&state, &format!("player{i}")).await;
        tournament_service::join_current(&state, player).await.unwrap();
    }

    let round1 = list_matches(&state, summary.id).await;

    // Nothing decided yet: there is no round to advance from.
    let outcome = bracket::advance_bracket(&state, summary.id).await.unwrap();
    assert_eq!(outcome, AdvanceOutcome::RoundIncomplete);

    play_match(&state, &round1[0], voter).await;
    // One undecided match keeps the round open.
    let outcome = bracket::advance_bracket(&state, summary.id).await.unwrap();
    assert_eq!(outcome, AdvanceOutcome::RoundIncomplete);

    play_match(&state, &round1[1], voter).await;
    // The winning commit already advanced; a second call writes nothing.
    let outcome = bracket::advance_bracket(&state, summary.id).await.unwrap();
    assert_eq!(outcome, AdvanceOutcome::AlreadyAdvanced);
    assert_eq!(list_matches(&state, summary.id).await.len(), 3);
}

#[tokio::test]
async fn direct_winner_assignment_is_write_once() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
            .await
            .unwrap();
    for i in 0..4 {
        let player = create_player(&state, &format!("player{i}")).await;
        tournament_service::join_current(&state, player).await.unwrap();
    }

    let game = list_matches(&state, summary.id).await.remove(0);
    match_service::assign_winner(&state, game.id, game.player1_id)
        .await
        .unwrap();

    let err = match_service::assign_winner(&state, game.id, game.player2_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let stored = list_matches(&state, summary.id)
        .await
        .into_iter()
        .find(|m| m.id == game.id)
        .unwrap();
    assert_eq!(stored.winner_id, Some(game.player1_id));
}

#[tokio::test]
async fn force_finish_leaves_no_champion_and_frees_the_slot() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();
    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    tournament_service::join_current(&state, bob).await.unwrap();

    let ended = tournament_service::force_finish(&state).await.unwrap();
    assert_eq!(ended.status, TournamentStatus::Finished);
    assert!(ended.admin_ended);

    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    assert!(snapshot.champion.is_none());

    // The slot is free again: a new lobby can open.
    tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_discards_the_bracket_but_keeps_the_roster() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();
    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    tournament_service::join_current(&state, bob).await.unwrap();
    assert_eq!(list_matches(&state, summary.id).await.len(), 1);

    let reopened = tournament_service::reset_to_lobby(&state, summary.id)
        .await
        .unwrap();
    assert_eq!(reopened.status, TournamentStatus::Lobby);

    assert!(list_matches(&state, summary.id).await.is_empty());
    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    assert_eq!(snapshot.participants.len(), 2);
}

#[tokio::test]
async fn bot_fill_starts_the_bracket() {
    let state = test_state().await;
    tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
        .await
        .unwrap();
    let human = create_player(&state, "lone_human").await;
    tournament_service::join_current(&state, human).await.unwrap();

    let report = profile_service::fill_with_bots(&state).await.unwrap();
    assert_eq!(report.added, 3);
    assert_eq!(report.participant_count, 4);
    assert!(report.started);

    let snapshot = public_service::snapshot_by_id(&state, report.tournament_id)
        .await
        .unwrap();
    assert_eq!(snapshot.tournament.status, TournamentStatus::InProgress);
    assert_eq!(
        snapshot
            .participants
            .iter()
            .filter(|user| user.is_bot)
            .count(),
        3
    );
}

#[tokio::test]
async fn bots_in_the_open_tournament_survive_cleanup() {
    let state = test_state().await;
    tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(4, false))
        .await
        .unwrap();
    let human = create_player(&state, "lone_human").await;
    tournament_service::join_current(&state, human).await.unwrap();
    profile_service::fill_with_bots(&state).await.unwrap();

    let report = profile_service::cleanup_bots(&state).await.unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(report.skipped, 3);
}

#[tokio::test]
async fn anonymous_voting_masks_identities_until_results() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, true))
            .await
            .unwrap();
    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    let voter = create_player(&state, "spectator").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    tournament_service::join_current(&state, bob).await.unwrap();

    let game = list_matches(&state, summary.id).await.remove(0);
    let favourite = match_service::submit_image(&state, game.player1_id, game.id, vec![1; 16])
        .await
        .unwrap();
    match_service::submit_image(&state, game.player2_id, game.id, vec![2; 16])
        .await
        .unwrap();

    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    let view = &snapshot.matches[0];
    assert_eq!(view.phase, MatchPhase::Voting);
    assert!(view.player1.user_id.is_none());
    assert!(view.player2.username.is_none());
    assert!(view.submissions.iter().all(|s| s.user_id.is_none()));
    assert!(view.submissions.iter().all(|s| s.votes.is_none()));

    match_service::cast_vote(
        &state,
        voter,
        game.id,
        VoteRequest {
            submission_id: favourite.id,
        },
    )
    .await
    .unwrap();
    match_service::end_voting(&state, game.id).await.unwrap();

    let snapshot = public_service::snapshot_by_id(&state, summary.id)
        .await
        .unwrap();
    let view = &snapshot.matches[0];
    assert_eq!(view.phase, MatchPhase::Results);
    assert!(view.player1.user_id.is_some());
    assert!(view.submissions.iter().all(|s| s.user_id.is_some()));
    let revealed: u64 = view.submissions.iter().filter_map(|s| s.votes).sum();
    assert_eq!(revealed, 1);
}

#[tokio::test]
async fn voting_needs_both_submissions() {
    let state = test_state().await;
    let summary =
        tournament_service::create_tournament(&state, Uuid::new_v4(), tournament_request(2, false))
            .await
            .unwrap();
    let alice = create_player(&state, "alice").await;
    let bob = create_player(&state, "bob").await;
    let voter = create_player(&state, "spectator").await;
    tournament_service::join_current(&state, alice).await.unwrap();
    tournament_service::join_current(&state, bob).await.unwrap();

    let game = list_matches(&state, summary.id).await.remove(0);
    let only = match_service::submit_image(&state, game.player1_id, game.id, vec![1; 16])
        .await
        .unwrap();

    let err = match_service::cast_vote(
        &state,
        voter,
        game.id,
        VoteRequest {
            submission_id: only.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn degraded_mode_rejects_requests() {
    let blob = Arc::new(FsBlobStore::new(
        std::env::temp_dir().join(format!("imaginarena-test-{}", Uuid::new_v4())),
        "/uploads".to_owned(),
    ));
    let state = AppState::new(AppConfig::default(), blob);

    let err = tournament_service::join_current(&state, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Degraded));
}
