use std::time::{Duration, SystemTime};

use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        changes::{ChangeEvent, ChangeOp, Table},
        models::{ParticipantEntity, TournamentStatus, UserEntity},
    },
    dto::{
        admin::{BotCleanupReport, BotFillReport},
        profile::{CreateProfileRequest, ProfileResponse},
    },
    error::ServiceError,
    services::{sse_events::broadcast_change, tournament_service},
    state::SharedState,
};

/// How long a profile lookup may take before it is treated as a miss.
const PROFILE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Look up the profile of the authenticated user, bounded by a timeout so a
/// slow storage backend cannot stall the login flow. A timeout fails over to
/// the needs-profile-creation outcome instead of hanging.
pub async fn bootstrap_profile(
    state: &SharedState,
    user_id: Uuid,
) -> Result<ProfileResponse, ServiceError> {
    let store = state.require_store().await?;

    let lookup = store.find_user(user_id);
    let user = match timeout(PROFILE_LOOKUP_TIMEOUT, lookup).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(%user_id, "profile lookup timed out; treating as missing profile");
            return Err(ServiceError::NotFound(
                "profile lookup timed out; create a profile".into(),
            ));
        }
    };

    user.map(Into::into)
        .ok_or_else(|| ServiceError::NotFound("no profile for this user".into()))
}

/// Create a profile for the authenticated user. Usernames are unique; admin
/// rights come from the configured allow list.
pub async fn create_profile(
    state: &SharedState,
    user_id: Uuid,
    request: CreateProfileRequest,
) -> Result<ProfileResponse, ServiceError> {
    let store = state.require_store().await?;

    if store.find_user(user_id).await?.is_some() {
        return Err(ServiceError::Conflict(
            "profile already exists for this user".into(),
        ));
    }

    let user = UserEntity {
        id: user_id,
        username: request.username.clone(),
        is_admin: state.config().is_admin_username(&request.username),
        is_bot: false,
        created_at: SystemTime::now(),
    };
    store.insert_user(user.clone()).await?;

    info!(%user_id, username = %user.username, "profile created");
    broadcast_change(
        state,
        ChangeEvent::new(Table::Users, ChangeOp::Insert, user_id),
    );

    Ok(user.into())
}

/// Pad the open lobby with bot players up to the tournament size. Filling
/// the last seat starts the bracket like a regular join would.
pub async fn fill_with_bots(state: &SharedState) -> Result<BotFillReport, ServiceError> {
    let store = state.require_store().await?;
    let tournament = store
        .current_tournament()
        .await?
        .ok_or_else(|| ServiceError::NotFound("no open tournament".into()))?;

    if tournament.status != TournamentStatus::Lobby {
        return Err(ServiceError::InvalidState(
            "tournament has already started".into(),
        ));
    }

    let current_count = store.list_participants(tournament.id).await?.len() as u32;
    let missing = tournament.tournament_size.saturating_sub(current_count);

    for _ in 0..missing {
        let bot_id = Uuid::new_v4();
        let bot = UserEntity {
            id: bot_id,
            username: bot_username(bot_id),
            is_admin: false,
            is_bot: true,
            created_at: SystemTime::now(),
        };
        store.insert_user(bot).await?;
        store
            .add_participant(ParticipantEntity {
                tournament_id: tournament.id,
                user_id: bot_id,
                joined_at: SystemTime::now(),
            })
            .await?;
        broadcast_change(
            state,
            ChangeEvent::new(Table::Participants, ChangeOp::Insert, bot_id)
                .in_tournament(tournament.id),
        );
    }

    let participant_count = store.list_participants(tournament.id).await?.len() as u32;
    let started = if participant_count >= tournament.tournament_size {
        tournament_service::try_start_bracket(state, tournament.clone()).await?
    } else {
        false
    };

    info!(tournament_id = %tournament.id, added = missing, "lobby padded with bots");
    Ok(BotFillReport {
        tournament_id: tournament.id,
        added: missing,
        participant_count,
        started,
    })
}

/// Delete leftover bot accounts. Bots still seated in the open tournament
/// are kept; per-bot failures are logged and skipped so one broken row does
/// not block the sweep.
pub async fn cleanup_bots(state: &SharedState) -> Result<BotCleanupReport, ServiceError> {
    let store = state.require_store().await?;
    let bots = store.list_bot_users().await?;
    let active_tournament = store.current_tournament().await?.map(|t| t.id);

    let mut removed = 0;
    let mut skipped = 0;

    for bot in bots {
        let participations = match store.list_participations(bot.id).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(bot_id = %bot.id, error = %err, "failed to list bot participations");
                skipped += 1;
                continue;
            }
        };

        if let Some(active) = active_tournament
            && participations.contains(&active)
        {
            skipped += 1;
            continue;
        }

        if let Err(err) = store.remove_participations(bot.id).await {
            warn!(bot_id = %bot.id, error = %err, "failed to remove bot participations");
            skipped += 1;
            continue;
        }
        if let Err(err) = store.delete_user(bot.id).await {
            warn!(bot_id = %bot.id, error = %err, "failed to delete bot user");
            skipped += 1;
            continue;
        }

        broadcast_change(
            state,
            ChangeEvent::new(Table::Users, ChangeOp::Delete, bot.id),
        );
        removed += 1;
    }

    info!(removed, skipped, "bot cleanup pass finished");
    Ok(BotCleanupReport { removed, skipped })
}

/// Bot usernames stay within the regular username rules.
fn bot_username(id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("bot-{}", &simple[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::validation::validate_username;

    #[test]
    fn bot_usernames_pass_validation() {
        for _ in 0..16 {
            assert!(validate_username(&bot_username(Uuid::new_v4())).is_ok());
        }
    }
}
