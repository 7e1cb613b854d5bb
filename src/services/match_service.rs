use std::time::SystemTime;

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        blob::submission_path,
        changes::{ChangeEvent, ChangeOp, Table},
        models::{MatchEntity, SubmissionEntity, TournamentStatus, VoteEntity},
    },
    dto::matches::{
        ChangePromptResponse, MatchPhase, SubmissionResponse, VoteRequest, VotingResult,
    },
    error::ServiceError,
    services::{bracket, sse_events::broadcast_change},
    state::SharedState,
};

/// Largest accepted image payload, 8 MiB.
const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

/// Store an image submitted by one of the match players.
pub async fn submit_image(
    state: &SharedState,
    user_id: Uuid,
    match_id: Uuid,
    image: Vec<u8>,
) -> Result<SubmissionResponse, ServiceError> {
    if image.is_empty() {
        return Err(ServiceError::InvalidInput("empty image payload".into()));
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(ServiceError::InvalidInput(format!(
            "image exceeds {MAX_IMAGE_BYTES} bytes"
        )));
    }

    let store = state.require_store().await?;
    let game = find_live_match(state, match_id).await?;

    if !game.involves(user_id) {
        return Err(ServiceError::Unauthorized(
            "only the match players may submit".into(),
        ));
    }
    if game.is_complete() {
        return Err(ServiceError::InvalidState(
            "match winner is already decided".into(),
        ));
    }

    let submissions = store.list_submissions(match_id).await?;
    if submissions.iter().any(|s| s.user_id == user_id) {
        return Err(ServiceError::Conflict(
            "image already submitted for this match".into(),
        ));
    }

    let image_url = state
        .blob()
        .upload(submission_path(match_id, user_id), image)
        .await?;

    let submission = SubmissionEntity {
        id: Uuid::new_v4(),
        match_id,
        user_id,
        image_url: image_url.clone(),
        created_at: SystemTime::now(),
    };
    store.insert_submission(submission.clone()).await?;

    info!(%match_id, %user_id, "image submitted");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Submissions, ChangeOp::Insert, submission.id)
            .in_tournament(game.tournament_id)
            .in_match(match_id),
    );

    Ok(SubmissionResponse {
        id: submission.id,
        match_id,
        image_url,
    })
}

/// Cast a spectator vote for one of the two submissions of a match.
pub async fn cast_vote(
    state: &SharedState,
    voter_id: Uuid,
    match_id: Uuid,
    request: VoteRequest,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    store
        .find_user(voter_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("create a profile before voting".into()))?;

    let game = find_live_match(state, match_id).await?;
    if game.involves(voter_id) {
        return Err(ServiceError::InvalidInput(
            "players cannot vote in their own match".into(),
        ));
    }

    let submissions = store.list_submissions(match_id).await?;
    if MatchPhase::derive(submissions.len(), game.is_complete()) != MatchPhase::Voting {
        return Err(ServiceError::InvalidState(
            "match is not open for voting".into(),
        ));
    }
    if !submissions.iter().any(|s| s.id == request.submission_id) {
        return Err(ServiceError::InvalidInput(
            "submission does not belong to this match".into(),
        ));
    }

    let vote = VoteEntity {
        id: Uuid::new_v4(),
        match_id,
        voter_id,
        submission_id: request.submission_id,
        created_at: SystemTime::now(),
    };
    store.insert_vote(vote.clone()).await?;

    broadcast_change(
        state,
        ChangeEvent::new(Table::Votes, ChangeOp::Insert, vote.id)
            .in_tournament(game.tournament_id)
            .in_match(match_id),
    );

    Ok(())
}

/// Close the voting window: the submission with the strict majority wins.
/// An even split (including zero votes on both sides) leaves the match tied
/// and awaiting a tie-break.
pub async fn end_voting(
    state: &SharedState,
    match_id: Uuid,
) -> Result<VotingResult, ServiceError> {
    let store = state.require_store().await?;
    let game = find_live_match(state, match_id).await?;
    let (first, second) = voting_submissions(state, &game).await?;

    let votes = store.list_votes(match_id).await?;
    let first_count = votes.iter().filter(|v| v.submission_id == first.id).count();
    let second_count = votes
        .iter()
        .filter(|v| v.submission_id == second.id)
        .count();

    if first_count == second_count {
        info!(%match_id, votes = first_count + second_count, "voting ended in a tie");
        return Ok(VotingResult {
            match_id,
            winner_id: None,
            tied: true,
        });
    }

    let winner_id = if first_count > second_count {
        first.user_id
    } else {
        second.user_id
    };

    commit_winner(state, &game, winner_id).await?;
    Ok(VotingResult {
        match_id,
        winner_id: Some(winner_id),
        tied: false,
    })
}

/// Break a tie with a server-side coin toss between the two submitters.
pub async fn resolve_tie(
    state: &SharedState,
    match_id: Uuid,
) -> Result<VotingResult, ServiceError> {
    let store = state.require_store().await?;
    let game = find_live_match(state, match_id).await?;
    let (first, second) = voting_submissions(state, &game).await?;

    let votes = store.list_votes(match_id).await?;
    let first_count = votes.iter().filter(|v| v.submission_id == first.id).count();
    let second_count = votes
        .iter()
        .filter(|v| v.submission_id == second.id)
        .count();

    if first_count != second_count {
        return Err(ServiceError::InvalidState(
            "votes are not tied; end voting instead".into(),
        ));
    }

    let winner_id = if rand::rng().random::<bool>() {
        first.user_id
    } else {
        second.user_id
    };

    info!(%match_id, %winner_id, "tie resolved by coin toss");
    commit_winner(state, &game, winner_id).await?;
    Ok(VotingResult {
        match_id,
        winner_id: Some(winner_id),
        tied: false,
    })
}

/// Directly assign the winner of a match, skipping or overriding the vote.
/// Fails once a winner has been committed.
pub async fn assign_winner(
    state: &SharedState,
    match_id: Uuid,
    winner_id: Uuid,
) -> Result<(), ServiceError> {
    let game = find_live_match(state, match_id).await?;
    if !game.involves(winner_id) {
        return Err(ServiceError::InvalidInput(
            "winner must be one of the match players".into(),
        ));
    }

    commit_winner(state, &game, winner_id).await
}

/// Draw a fresh prompt for a match. Players work against the prompt once
/// submissions arrive, so replacement is limited to the submission phase.
pub async fn change_prompt(
    state: &SharedState,
    match_id: Uuid,
) -> Result<ChangePromptResponse, ServiceError> {
    let store = state.require_store().await?;
    let game = find_live_match(state, match_id).await?;

    let submissions = store.list_submissions(match_id).await?;
    if MatchPhase::derive(submissions.len(), game.is_complete()) != MatchPhase::Submission {
        return Err(ServiceError::InvalidState(
            "prompt can only change while submissions are open".into(),
        ));
    }

    let tournament = store
        .find_tournament(game.tournament_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("tournament not found".into()))?;
    let used: Vec<String> = store
        .list_matches(game.tournament_id)
        .await?
        .into_iter()
        .map(|m| m.prompt)
        .collect();
    let prompt = state.config().random_prompt(&tournament.language, &used);

    store.update_match_prompt(match_id, prompt.clone()).await?;

    info!(%match_id, "match prompt replaced");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Matches, ChangeOp::Update, match_id)
            .in_tournament(game.tournament_id)
            .in_match(match_id),
    );

    Ok(ChangePromptResponse { match_id, prompt })
}

/// Commit a winner with a compare-and-set, then try to advance the bracket.
///
/// The bracket advancement runs even when the commit lost the race, so a
/// retry after a partial failure still pushes the tournament forward.
async fn commit_winner(
    state: &SharedState,
    game: &MatchEntity,
    winner_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let committed = store.set_match_winner(game.id, winner_id).await?;

    if committed {
        info!(match_id = %game.id, %winner_id, "match winner committed");
        broadcast_change(
            state,
            ChangeEvent::new(Table::Matches, ChangeOp::Update, game.id)
                .in_tournament(game.tournament_id)
                .in_match(game.id),
        );
    }

    bracket::advance_bracket(state, game.tournament_id).await?;

    if committed {
        Ok(())
    } else {
        Err(ServiceError::Conflict(
            "match winner is already decided".into(),
        ))
    }
}

/// Fetch a match belonging to an in-progress tournament.
async fn find_live_match(
    state: &SharedState,
    match_id: Uuid,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_store().await?;
    let game = store
        .find_match(match_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("match not found".into()))?;

    let tournament = store
        .find_tournament(game.tournament_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("tournament not found".into()))?;
    if tournament.status != TournamentStatus::InProgress {
        return Err(ServiceError::InvalidState(
            "tournament is not in progress".into(),
        ));
    }

    Ok(game)
}

/// The two submissions of a match currently in its voting phase, in stored
/// order.
async fn voting_submissions(
    state: &SharedState,
    game: &MatchEntity,
) -> Result<(SubmissionEntity, SubmissionEntity), ServiceError> {
    let store = state.require_store().await?;
    let mut submissions = store.list_submissions(game.id).await?;

    if MatchPhase::derive(submissions.len(), game.is_complete()) != MatchPhase::Voting {
        return Err(ServiceError::InvalidState(
            "match is not open for voting".into(),
        ));
    }

    let second = submissions
        .pop()
        .ok_or_else(|| ServiceError::InvalidState("missing submission".into()))?;
    let first = submissions
        .pop()
        .ok_or_else(|| ServiceError::InvalidState("missing submission".into()))?;
    Ok((first, second))
}
