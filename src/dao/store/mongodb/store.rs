use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MatchDocument, ParticipantDocument, SubmissionDocument, TournamentDocument, UserDocument,
        VoteDocument, doc_id, uuid_as_binary,
    },
};
use crate::dao::{
    models::{
        MatchEntity, ParticipantEntity, SubmissionEntity, TournamentEntity, UserEntity, VoteEntity,
    },
    storage::StorageResult,
    store::TournamentStore,
};

const USERS: &str = "users";
const TOURNAMENTS: &str = "tournaments";
const PARTICIPANTS: &str = "tournament_participants";
const MATCHES: &str = "matches";
const SUBMISSIONS: &str = "submissions";
const VOTES: &str = "votes";

#[derive(Clone)]
pub struct MongoTournamentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoTournamentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Unique indexes carry the data-model constraints: one membership per
    /// (tournament, user), one submission per (match, user), one vote per
    /// (match, voter), unique usernames.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        create_index(
            &database.collection::<UserDocument>(USERS),
            USERS,
            "username",
            doc! {"username": 1},
            true,
        )
        .await?;
        create_index(
            &database.collection::<ParticipantDocument>(PARTICIPANTS),
            PARTICIPANTS,
            "tournament_id,user_id",
            doc! {"tournament_id": 1, "user_id": 1},
            true,
        )
        .await?;
        create_index(
            &database.collection::<MatchDocument>(MATCHES),
            MATCHES,
            "tournament_id,round,slot",
            doc! {"tournament_id": 1, "round": 1, "slot": 1},
            false,
        )
        .await?;
        create_index(
            &database.collection::<SubmissionDocument>(SUBMISSIONS),
            SUBMISSIONS,
            "match_id,user_id",
            doc! {"match_id": 1, "user_id": 1},
            true,
        )
        .await?;
        create_index(
            &database.collection::<VoteDocument>(VOTES),
            VOTES,
            "match_id,voter_id",
            doc! {"match_id": 1, "voter_id": 1},
            true,
        )
        .await?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }
}

async fn create_index<T: Send + Sync>(
    collection: &Collection<T>,
    collection_name: &'static str,
    index_name: &'static str,
    keys: mongodb::bson::Document,
    unique: bool,
) -> MongoResult<()> {
    let index = IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(Some(format!("{collection_name}_{index_name}_idx")))
                .unique(unique.then_some(true))
                .build(),
        )
        .build();

    collection
        .create_index(index)
        .await
        .map_err(|source| MongoDaoError::EnsureIndex {
            collection: collection_name,
            index: index_name,
            source,
        })?;
    Ok(())
}

impl MongoTournamentStore {
    async fn insert_user(&self, user: UserEntity) -> MongoResult<()> {
        let document: UserDocument = user.into();
        self.collection::<UserDocument>(USERS)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::from_insert(USERS, "users.username", source))?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> MongoResult<Option<UserEntity>> {
        let document = self
            .collection::<UserDocument>(USERS)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: USERS,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_bot_users(&self) -> MongoResult<Vec<UserEntity>> {
        let documents: Vec<UserDocument> = self
            .collection::<UserDocument>(USERS)
            .await
            .find(doc! {"is_bot": true})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: USERS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: USERS,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn delete_user(&self, id: Uuid) -> MongoResult<()> {
        self.collection::<UserDocument>(USERS)
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: USERS,
                source,
            })?;
        Ok(())
    }

    async fn insert_tournament(&self, tournament: TournamentEntity) -> MongoResult<()> {
        let document: TournamentDocument = tournament.into();
        self.collection::<TournamentDocument>(TOURNAMENTS)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TOURNAMENTS,
                source,
            })?;
        Ok(())
    }

    async fn find_tournament(&self, id: Uuid) -> MongoResult<Option<TournamentEntity>> {
        let document = self
            .collection::<TournamentDocument>(TOURNAMENTS)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: TOURNAMENTS,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn current_tournament(&self) -> MongoResult<Option<TournamentEntity>> {
        let document = self
            .collection::<TournamentDocument>(TOURNAMENTS)
            .await
            .find_one(doc! {"status": {"$ne": "finished"}})
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: TOURNAMENTS,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn update_tournament(&self, tournament: TournamentEntity) -> MongoResult<()> {
        let id = tournament.id;
        let document: TournamentDocument = tournament.into();
        self.collection::<TournamentDocument>(TOURNAMENTS)
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: TOURNAMENTS,
                source,
            })?;
        Ok(())
    }

    async fn add_participant(&self, participant: ParticipantEntity) -> MongoResult<()> {
        let document: ParticipantDocument = participant.into();
        self.collection::<ParticipantDocument>(PARTICIPANTS)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                MongoDaoError::from_insert(PARTICIPANTS, "participants.tournament_user", source)
            })?;
        Ok(())
    }

    async fn list_participants(&self, tournament_id: Uuid) -> MongoResult<Vec<UserEntity>> {
        let rows: Vec<ParticipantDocument> = self
            .collection::<ParticipantDocument>(PARTICIPANTS)
            .await
            .find(doc! {"tournament_id": uuid_as_binary(tournament_id)})
            .sort(doc! {"joined_at": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTICIPANTS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTICIPANTS,
                source,
            })?;

        // Two-step join: resolve the roster to user rows preserving join order.
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(user) = self.find_user(row.user_id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn list_participations(&self, user_id: Uuid) -> MongoResult<Vec<Uuid>> {
        let rows: Vec<ParticipantDocument> = self
            .collection::<ParticipantDocument>(PARTICIPANTS)
            .await
            .find(doc! {"user_id": uuid_as_binary(user_id)})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTICIPANTS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: PARTICIPANTS,
                source,
            })?;
        Ok(rows.into_iter().map(|row| row.tournament_id).collect())
    }

    async fn remove_participations(&self, user_id: Uuid) -> MongoResult<()> {
        self.collection::<ParticipantDocument>(PARTICIPANTS)
            .await
            .delete_many(doc! {"user_id": uuid_as_binary(user_id)})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PARTICIPANTS,
                source,
            })?;
        Ok(())
    }

    async fn insert_matches(&self, matches: Vec<MatchEntity>) -> MongoResult<()> {
        let documents: Vec<MatchDocument> = matches.into_iter().map(Into::into).collect();
        self.collection::<MatchDocument>(MATCHES)
            .await
            .insert_many(&documents)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MATCHES,
                source,
            })?;
        Ok(())
    }

    async fn list_matches(&self, tournament_id: Uuid) -> MongoResult<Vec<MatchEntity>> {
        let documents: Vec<MatchDocument> = self
            .collection::<MatchDocument>(MATCHES)
            .await
            .find(doc! {"tournament_id": uuid_as_binary(tournament_id)})
            .sort(doc! {"round": 1, "slot": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: MATCHES,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: MATCHES,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_match(&self, id: Uuid) -> MongoResult<Option<MatchEntity>> {
        let document = self
            .collection::<MatchDocument>(MATCHES)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: MATCHES,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn set_match_winner(&self, match_id: Uuid, winner_id: Uuid) -> MongoResult<bool> {
        // Conditional on winner_id still being null: the commit is terminal
        // and concurrent attempts lose cleanly.
        let result = self
            .collection::<MatchDocument>(MATCHES)
            .await
            .update_one(
                doc! {"_id": uuid_as_binary(match_id), "winner_id": null},
                doc! {"$set": {"winner_id": uuid_as_binary(winner_id)}},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MATCHES,
                source,
            })?;
        Ok(result.modified_count > 0)
    }

    async fn update_match_prompt(&self, match_id: Uuid, prompt: String) -> MongoResult<()> {
        self.collection::<MatchDocument>(MATCHES)
            .await
            .update_one(doc_id(match_id), doc! {"$set": {"prompt": prompt}})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MATCHES,
                source,
            })?;
        Ok(())
    }

    async fn delete_matches(&self, tournament_id: Uuid) -> MongoResult<()> {
        let match_ids: Vec<_> = self
            .list_matches(tournament_id)
            .await?
            .into_iter()
            .map(|game| uuid_as_binary(game.id))
            .collect();

        self.collection::<MatchDocument>(MATCHES)
            .await
            .delete_many(doc! {"tournament_id": uuid_as_binary(tournament_id)})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MATCHES,
                source,
            })?;

        if match_ids.is_empty() {
            return Ok(());
        }

        self.collection::<SubmissionDocument>(SUBMISSIONS)
            .await
            .delete_many(doc! {"match_id": {"$in": match_ids.clone()}})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: SUBMISSIONS,
                source,
            })?;
        self.collection::<VoteDocument>(VOTES)
            .await
            .delete_many(doc! {"match_id": {"$in": match_ids}})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: VOTES,
                source,
            })?;
        Ok(())
    }

    async fn insert_submission(&self, submission: SubmissionEntity) -> MongoResult<()> {
        let document: SubmissionDocument = submission.into();
        self.collection::<SubmissionDocument>(SUBMISSIONS)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                MongoDaoError::from_insert(SUBMISSIONS, "submissions.match_user", source)
            })?;
        Ok(())
    }

    async fn list_submissions(&self, match_id: Uuid) -> MongoResult<Vec<SubmissionEntity>> {
        let documents: Vec<SubmissionDocument> = self
            .collection::<SubmissionDocument>(SUBMISSIONS)
            .await
            .find(doc! {"match_id": uuid_as_binary(match_id)})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: SUBMISSIONS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: SUBMISSIONS,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_vote(&self, vote: VoteEntity) -> MongoResult<()> {
        let document: VoteDocument = vote.into();
        self.collection::<VoteDocument>(VOTES)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::from_insert(VOTES, "votes.match_voter", source))?;
        Ok(())
    }

    async fn list_votes(&self, match_id: Uuid) -> MongoResult<Vec<VoteEntity>> {
        let documents: Vec<VoteDocument> = self
            .collection::<VoteDocument>(VOTES)
            .await
            .find(doc! {"match_id": uuid_as_binary(match_id)})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: VOTES,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: VOTES,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl TournamentStore for MongoTournamentStore {
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_user(user).await.map_err(Into::into) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(id).await.map_err(Into::into) })
    }

    fn list_bot_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_bot_users().await.map_err(Into::into) })
    }

    fn delete_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_user(id).await.map_err(Into::into) })
    }

    fn insert_tournament(
        &self,
        tournament: TournamentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_tournament(tournament).await.map_err(Into::into) })
    }

    fn find_tournament(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_tournament(id).await.map_err(Into::into) })
    }

    fn current_tournament(&self) -> BoxFuture<'static, StorageResult<Option<TournamentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.current_tournament().await.map_err(Into::into) })
    }

    fn update_tournament(
        &self,
        tournament: TournamentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_tournament(tournament).await.map_err(Into::into) })
    }

    fn add_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.add_participant(participant).await.map_err(Into::into) })
    }

    fn list_participants(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_participants(tournament_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_participations(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.list_participations(user_id).await.map_err(Into::into) })
    }

    fn remove_participations(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .remove_participations(user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_matches(&self, matches: Vec<MatchEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_matches(matches).await.map_err(Into::into) })
    }

    fn list_matches(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches(tournament_id).await.map_err(Into::into) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn set_match_winner(
        &self,
        match_id: Uuid,
        winner_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_match_winner(match_id, winner_id)
                .await
                .map_err(Into::into)
        })
    }

    fn update_match_prompt(
        &self,
        match_id: Uuid,
        prompt: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_match_prompt(match_id, prompt)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_matches(&self, tournament_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_matches(tournament_id).await.map_err(Into::into) })
    }

    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_submission(submission).await.map_err(Into::into) })
    }

    fn list_submissions(
        &self,
        match_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_submissions(match_id).await.map_err(Into::into) })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_vote(vote).await.map_err(Into::into) })
    }

    fn list_votes(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_votes(match_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
