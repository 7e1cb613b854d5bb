use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{
        changes::{ChangeEvent, ChangeOp, Table},
        models::{ParticipantEntity, TournamentEntity, TournamentStatus},
    },
    dto::{
        common::TournamentSummary,
        tournament::{CreateTournamentRequest, JoinResponse},
    },
    error::ServiceError,
    services::{bracket, sse_events::broadcast_change},
    state::{
        SharedState,
        machine::{FinishReason, TournamentEvent},
    },
};

/// Open a new tournament lobby. Only one non-finished tournament may exist
/// at a time.
pub async fn create_tournament(
    state: &SharedState,
    created_by: Uuid,
    request: CreateTournamentRequest,
) -> Result<TournamentSummary, ServiceError> {
    let store = state.require_store().await?;

    if !state.config().supports_language(&request.language) {
        return Err(ServiceError::InvalidInput(format!(
            "no prompt pool for language `{}`",
            request.language
        )));
    }

    if let Some(open) = store.current_tournament().await? {
        return Err(ServiceError::Conflict(format!(
            "tournament {} is still open",
            open.id
        )));
    }

    let tournament = TournamentEntity {
        id: Uuid::new_v4(),
        status: TournamentStatus::Lobby,
        tournament_size: request.tournament_size,
        language: request.language,
        anonymous_voting: request.anonymous_voting,
        admin_ended: false,
        created_by,
        created_at: SystemTime::now(),
    };

    let row = tournament.clone();
    let work_store = store.clone();
    let insert = move || async move {
        work_store.insert_tournament(row).await?;
        Ok(())
    };

    // The previous tournament leaves the machine in finished; opening a new
    // lobby is the reset transition. A fresh process is already in lobby.
    match state.lifecycle_status().await {
        TournamentStatus::Finished => {
            state
                .run_transition(TournamentEvent::Reset, insert)
                .await?;
        }
        TournamentStatus::Lobby => insert().await?,
        TournamentStatus::InProgress => {
            return Err(ServiceError::InvalidState(
                "a tournament is currently in progress".into(),
            ));
        }
    }

    info!(tournament_id = %tournament.id, size = tournament.tournament_size, "tournament lobby opened");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Tournaments, ChangeOp::Insert, tournament.id)
            .in_tournament(tournament.id),
    );

    Ok(tournament.into())
}

/// Join the open lobby as the authenticated user. The join that fills the
/// lobby also generates the first round and starts the bracket.
pub async fn join_current(
    state: &SharedState,
    user_id: Uuid,
) -> Result<JoinResponse, ServiceError> {
    let store = state.require_store().await?;

    store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("create a profile before joining".into()))?;

    let tournament = store
        .current_tournament()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no open tournament".into()))?;

    if tournament.status != TournamentStatus::Lobby {
        return Err(ServiceError::InvalidState(
            "tournament has already started".into(),
        ));
    }

    store
        .add_participant(ParticipantEntity {
            tournament_id: tournament.id,
            user_id,
            joined_at: SystemTime::now(),
        })
        .await?;

    broadcast_change(
        state,
        ChangeEvent::new(Table::Participants, ChangeOp::Insert, user_id)
            .in_tournament(tournament.id),
    );

    let participant_count = store.list_participants(tournament.id).await?.len() as u32;

    let started = if participant_count >= tournament.tournament_size {
        try_start_bracket(state, tournament.clone()).await?
    } else {
        false
    };

    Ok(JoinResponse {
        tournament_id: tournament.id,
        participant_count,
        started,
    })
}

/// Start the bracket for a full lobby. Returns `false` when a concurrent
/// caller won the start; the lifecycle machine admits the transition once.
///
/// The roster is re-read inside the transition so joins that raced past the
/// capacity check cannot poison the start: the first `tournament_size`
/// joiners are seated and any later row is simply left out of the bracket.
pub(crate) async fn try_start_bracket(
    state: &SharedState,
    tournament: TournamentEntity,
) -> Result<bool, ServiceError> {
    let store = state.require_store().await?;
    let tournament_id = tournament.id;

    let config = state.config().clone();
    let work_store = store.clone();
    let result = state
        .run_transition(TournamentEvent::Start, move || async move {
            let mut roster = work_store.list_participants(tournament.id).await?;
            roster.truncate(tournament.tournament_size as usize);

            let matches = bracket::generate_first_round(&config, &tournament, &roster)?;
            work_store.insert_matches(matches.clone()).await?;

            let mut started = tournament;
            started.status = TournamentStatus::InProgress;
            work_store.update_tournament(started).await?;
            Ok(matches)
        })
        .await;

    let matches = match result {
        Ok((matches, _status)) => matches,
        // A concurrent join already started the bracket.
        Err(ServiceError::InvalidState(_)) => return Ok(false),
        Err(err) => return Err(err),
    };

    info!(%tournament_id, matches = matches.len(), "lobby full; bracket started");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Tournaments, ChangeOp::Update, tournament_id)
            .in_tournament(tournament_id),
    );
    for game in &matches {
        broadcast_change(
            state,
            ChangeEvent::new(Table::Matches, ChangeOp::Insert, game.id)
                .in_tournament(tournament_id),
        );
    }

    Ok(true)
}

/// Toggle identity hiding on the current tournament.
pub async fn set_anonymous_voting(
    state: &SharedState,
    anonymous_voting: bool,
) -> Result<TournamentSummary, ServiceError> {
    let store = state.require_store().await?;
    let mut tournament = store
        .current_tournament()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no open tournament".into()))?;

    tournament.anonymous_voting = anonymous_voting;
    store.update_tournament(tournament.clone()).await?;

    broadcast_change(
        state,
        ChangeEvent::new(Table::Tournaments, ChangeOp::Update, tournament.id)
            .in_tournament(tournament.id),
    );

    Ok(tournament.into())
}

/// End the current tournament early without a champion.
pub async fn force_finish(state: &SharedState) -> Result<TournamentSummary, ServiceError> {
    let store = state.require_store().await?;
    let tournament = store
        .current_tournament()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no open tournament".into()))?;

    if tournament.status != TournamentStatus::InProgress {
        return Err(ServiceError::InvalidState(
            "only an in-progress tournament can be force finished".into(),
        ));
    }

    let mut ended = tournament.clone();
    ended.status = TournamentStatus::Finished;
    ended.admin_ended = true;

    let row = ended.clone();
    let work_store = store.clone();
    state
        .run_transition(
            TournamentEvent::Finish(FinishReason::AdminEnded),
            move || async move {
                work_store.update_tournament(row).await?;
                Ok(())
            },
        )
        .await?;

    info!(tournament_id = %ended.id, "tournament force finished by admin");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Tournaments, ChangeOp::Update, ended.id)
            .in_tournament(ended.id),
    );

    Ok(ended.into())
}

/// Return a tournament to an open lobby, deleting its bracket but keeping
/// the participant roster.
pub async fn reset_to_lobby(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<TournamentSummary, ServiceError> {
    let store = state.require_store().await?;
    let tournament = store
        .find_tournament(tournament_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("tournament not found".into()))?;

    if tournament.status == TournamentStatus::Lobby {
        return Err(ServiceError::InvalidState(
            "tournament is already a lobby".into(),
        ));
    }

    if let Some(open) = store.current_tournament().await?
        && open.id != tournament_id
    {
        return Err(ServiceError::Conflict(format!(
            "tournament {} is still open",
            open.id
        )));
    }

    // A restarted process boots its machine in lobby; realign it with the
    // stored status before planning the reset.
    if state.lifecycle_status().await != tournament.status {
        state.resume_lifecycle(tournament.status).await;
    }

    let mut reopened = tournament;
    reopened.status = TournamentStatus::Lobby;
    reopened.admin_ended = false;

    let row = reopened.clone();
    let work_store = store.clone();
    state
        .run_transition(TournamentEvent::Reset, move || async move {
            work_store.delete_matches(tournament_id).await?;
            work_store.update_tournament(row).await?;
            Ok(())
        })
        .await?;

    info!(%tournament_id, "tournament reset to lobby");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Tournaments, ChangeOp::Update, tournament_id)
            .in_tournament(tournament_id),
    );

    Ok(reopened.into())
}
