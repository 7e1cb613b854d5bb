#[cfg(feature = "memory-store")]
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    MatchEntity, ParticipantEntity, SubmissionEntity, TournamentEntity, UserEntity, VoteEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for tournaments, matches,
/// submissions, votes, and user accounts.
///
/// Backends enforce the uniqueness constraints of the data model
/// ((tournament, user) membership, (match, user) submission,
/// (match, voter) vote, username) and surface violations as
/// [`StorageError::Conflict`](crate::dao::storage::StorageError).
pub trait TournamentStore: Send + Sync {
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn list_bot_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    fn delete_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_tournament(
        &self,
        tournament: TournamentEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn find_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>>;
    /// Most recently created tournament that has not finished yet.
    fn current_tournament(&self) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>>;
    fn update_tournament(
        &self,
        tournament: TournamentEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Resolve the participant roster to user rows, in join order.
    fn list_participants(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    /// Tournament ids a user has ever joined, used by bot cleanup.
    fn list_participations(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;
    fn remove_participations(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    /// Bulk-insert a round of matches.
    fn insert_matches(&self, matches: Vec<MatchEntity>) -> BoxFuture<'static, StorageResult<()>>;
    /// All matches of a tournament ordered by (round, slot).
    fn list_matches(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Compare-and-set winner commit: succeeds only while `winner_id` is
    /// still null. Returns whether the row was updated.
    fn set_match_winner(
        &self,
        match_id: Uuid,
        winner_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn update_match_prompt(
        &self,
        match_id: Uuid,
        prompt: String,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete all matches of a tournament along with their submissions and
    /// votes (admin reset path).
    fn delete_matches(&self, tournament_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;

    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn list_submissions(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>>;

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn list_votes(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
