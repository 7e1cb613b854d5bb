//! In-memory storage backend.
//!
//! Backs integration tests and storage-free development runs with the same
//! constraint semantics as the MongoDB backend: uniqueness violations come
//! back as [`StorageError::Conflict`] and the winner commit is
//! compare-and-set.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::{
    models::{
        MatchEntity, ParticipantEntity, SubmissionEntity, TournamentEntity, TournamentStatus,
        UserEntity, VoteEntity,
    },
    storage::{StorageError, StorageResult},
    store::TournamentStore,
};

/// Process-local [`TournamentStore`] implementation.
#[derive(Clone, Default)]
pub struct MemoryTournamentStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    users: DashMap<Uuid, UserEntity>,
    // IndexMap keeps creation order, which "current tournament" relies on.
    tournaments: Mutex<IndexMap<Uuid, TournamentEntity>>,
    participants: Mutex<Vec<ParticipantEntity>>,
    matches: Mutex<IndexMap<Uuid, MatchEntity>>,
    submissions: Mutex<Vec<SubmissionEntity>>,
    votes: Mutex<Vec<VoteEntity>>,
}

impl MemoryTournamentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        // Lock poisoning only happens when another thread panicked while
        // holding the guard; propagating the panic is the right call here.
        mutex.lock().expect("memory store lock poisoned")
    }
}

impl TournamentStore for MemoryTournamentStore {
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let duplicate = inner
                .users
                .iter()
                .any(|existing| existing.username.eq_ignore_ascii_case(&user.username));
            if duplicate {
                return Err(StorageError::conflict("users.username"));
            }
            inner.users.insert(user.id, user);
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.users.get(&id).map(|entry| entry.clone())) })
    }

    fn list_bot_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .users
                .iter()
                .filter(|entry| entry.is_bot)
                .map(|entry| entry.clone())
                .collect())
        })
    }

    fn delete_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.users.remove(&id);
            Ok(())
        })
    }

    fn insert_tournament(
        &self,
        tournament: TournamentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::lock(&inner.tournaments).insert(tournament.id, tournament);
            Ok(())
        })
    }

    fn find_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(Self::lock(&inner.tournaments).get(&id).cloned()) })
    }

    fn current_tournament(&self) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(Self::lock(&inner.tournaments)
                .values()
                .rev()
                .find(|tournament| tournament.status != TournamentStatus::Finished)
                .cloned())
        })
    }

    fn update_tournament(
        &self,
        tournament: TournamentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::lock(&inner.tournaments).insert(tournament.id, tournament);
            Ok(())
        })
    }

    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut participants = Self::lock(&inner.participants);
            let duplicate = participants.iter().any(|existing| {
                existing.tournament_id == participant.tournament_id
                    && existing.user_id == participant.user_id
            });
            if duplicate {
                return Err(StorageError::conflict("participants.tournament_user"));
            }
            participants.push(participant);
            Ok(())
        })
    }

    fn list_participants(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let user_ids: Vec<Uuid> = Self::lock(&inner.participants)
                .iter()
                .filter(|row| row.tournament_id == tournament_id)
                .map(|row| row.user_id)
                .collect();
            Ok(user_ids
                .into_iter()
                .filter_map(|user_id| inner.users.get(&user_id).map(|entry| entry.clone()))
                .collect())
        })
    }

    fn list_participations(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(Self::lock(&inner.participants)
                .iter()
                .filter(|row| row.user_id == user_id)
                .map(|row| row.tournament_id)
                .collect())
        })
    }

    fn remove_participations(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Self::lock(&inner.participants).retain(|row| row.user_id != user_id);
            Ok(())
        })
    }

    fn insert_matches(&self, matches: Vec<MatchEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut table = Self::lock(&inner.matches);
            for game in matches {
                table.insert(game.id, game);
            }
            Ok(())
        })
    }

    fn list_matches(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut matches: Vec<MatchEntity> = Self::lock(&inner.matches)
                .values()
                .filter(|game| game.tournament_id == tournament_id)
                .cloned()
                .collect();
            matches.sort_by_key(|game| (game.round, game.slot));
            Ok(matches)
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(Self::lock(&inner.matches).get(&id).cloned()) })
    }

    fn set_match_winner(
        &self,
        match_id: Uuid,
        winner_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut table = Self::lock(&inner.matches);
            match table.get_mut(&match_id) {
                Some(game) if game.winner_id.is_none() => {
                    game.winner_id = Some(winner_id);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn update_match_prompt(
        &self,
        match_id: Uuid,
        prompt: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(game) = Self::lock(&inner.matches).get_mut(&match_id) {
                game.prompt = prompt;
            }
            Ok(())
        })
    }

    fn delete_matches(&self, tournament_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let removed: Vec<Uuid> = {
                let mut table = Self::lock(&inner.matches);
                let ids: Vec<Uuid> = table
                    .values()
                    .filter(|game| game.tournament_id == tournament_id)
                    .map(|game| game.id)
                    .collect();
                table.retain(|_, game| game.tournament_id != tournament_id);
                ids
            };
            Self::lock(&inner.submissions).retain(|row| !removed.contains(&row.match_id));
            Self::lock(&inner.votes).retain(|row| !removed.contains(&row.match_id));
            Ok(())
        })
    }

    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut submissions = Self::lock(&inner.submissions);
            let duplicate = submissions.iter().any(|existing| {
                existing.match_id == submission.match_id && existing.user_id == submission.user_id
            });
            if duplicate {
                return Err(StorageError::conflict("submissions.match_user"));
            }
            submissions.push(submission);
            Ok(())
        })
    }

    fn list_submissions(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(Self::lock(&inner.submissions)
                .iter()
                .filter(|row| row.match_id == match_id)
                .cloned()
                .collect())
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut votes = Self::lock(&inner.votes);
            let duplicate = votes
                .iter()
                .any(|existing| existing.match_id == vote.match_id && existing.voter_id == vote.voter_id);
            if duplicate {
                return Err(StorageError::conflict("votes.match_voter"));
            }
            votes.push(vote);
            Ok(())
        })
    }

    fn list_votes(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(Self::lock(&inner.votes)
                .iter()
                .filter(|row| row.match_id == match_id)
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn participant(tournament_id: Uuid, user_id: Uuid) -> ParticipantEntity {
        ParticipantEntity {
            tournament_id,
            user_id,
            joined_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_join_is_a_conflict() {
        let store = MemoryTournamentStore::new();
        let tournament_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        store
            .add_participant(participant(tournament_id, user_id))
            .await
            .unwrap();
        let err = store
            .add_participant(participant(tournament_id, user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn winner_commit_is_compare_and_set() {
        let store = MemoryTournamentStore::new();
        let player1 = Uuid::new_v4();
        let player2 = Uuid::new_v4();
        let game = MatchEntity {
            id: Uuid::new_v4(),
            tournament_id: Uuid::new_v4(),
            round: 1,
            slot: 0,
            player1_id: player1,
            player2_id: player2,
            prompt: "a sandwich in space".into(),
            winner_id: None,
            created_at: SystemTime::now(),
        };
        let match_id = game.id;
        store.insert_matches(vec![game]).await.unwrap();

        assert!(store.set_match_winner(match_id, player1).await.unwrap());
        // Second commit loses the race and must not flip the winner.
        assert!(!store.set_match_winner(match_id, player2).await.unwrap());
        let stored = store.find_match(match_id).await.unwrap().unwrap();
        assert_eq!(stored.winner_id, Some(player1));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = MemoryTournamentStore::new();
        let user = UserEntity {
            id: Uuid::new_v4(),
            username: "pixel_queen".into(),
            is_admin: false,
            is_bot: false,
            created_at: SystemTime::now(),
        };
        store.insert_user(user.clone()).await.unwrap();

        let other = UserEntity {
            id: Uuid::new_v4(),
            username: "Pixel_Queen".into(),
            ..user
        };
        let err = store.insert_user(other).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }
}
