use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    MatchEntity, ParticipantEntity, SubmissionEntity, TournamentEntity, TournamentStatus,
    UserEntity, VoteEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    username: String,
    is_admin: bool,
    is_bot: bool,
    created_at: DateTime,
}

impl From<UserEntity> for UserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            username: value.username,
            is_admin: value.is_admin,
            is_bot: value.is_bot,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<UserDocument> for UserEntity {
    fn from(value: UserDocument) -> Self {
        Self {
            id: value.id,
            username: value.username,
            is_admin: value.is_admin,
            is_bot: value.is_bot,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    status: TournamentStatus,
    tournament_size: u32,
    language: String,
    anonymous_voting: bool,
    admin_ended: bool,
    created_by: Uuid,
    created_at: DateTime,
}

impl From<TournamentEntity> for TournamentDocument {
    fn from(value: TournamentEntity) -> Self {
        Self {
            id: value.id,
            status: value.status,
            tournament_size: value.tournament_size,
            language: value.language,
            anonymous_voting: value.anonymous_voting,
            admin_ended: value.admin_ended,
            created_by: value.created_by,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<TournamentDocument> for TournamentEntity {
    fn from(value: TournamentDocument) -> Self {
        Self {
            id: value.id,
            status: value.status,
            tournament_size: value.tournament_size,
            language: value.language,
            anonymous_voting: value.anonymous_voting,
            admin_ended: value.admin_ended,
            created_by: value.created_by,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDocument {
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    joined_at: DateTime,
}

impl From<ParticipantEntity> for ParticipantDocument {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            tournament_id: value.tournament_id,
            user_id: value.user_id,
            joined_at: DateTime::from_system_time(value.joined_at),
        }
    }
}

impl From<ParticipantDocument> for ParticipantEntity {
    fn from(value: ParticipantDocument) -> Self {
        Self {
            tournament_id: value.tournament_id,
            user_id: value.user_id,
            joined_at: value.joined_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    tournament_id: Uuid,
    round: u32,
    slot: u32,
    player1_id: Uuid,
    player2_id: Uuid,
    prompt: String,
    winner_id: Option<Uuid>,
    created_at: DateTime,
}

impl From<MatchEntity> for MatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            tournament_id: value.tournament_id,
            round: value.round,
            slot: value.slot,
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            prompt: value.prompt,
            winner_id: value.winner_id,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MatchDocument> for MatchEntity {
    fn from(value: MatchDocument) -> Self {
        Self {
            id: value.id,
            tournament_id: value.tournament_id,
            round: value.round,
            slot: value.slot,
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            prompt: value.prompt,
            winner_id: value.winner_id,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    match_id: Uuid,
    user_id: Uuid,
    image_url: String,
    created_at: DateTime,
}

impl From<SubmissionEntity> for SubmissionDocument {
    fn from(value: SubmissionEntity) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            user_id: value.user_id,
            image_url: value.image_url,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<SubmissionDocument> for SubmissionEntity {
    fn from(value: SubmissionDocument) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            user_id: value.user_id,
            image_url: value.image_url,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    match_id: Uuid,
    voter_id: Uuid,
    submission_id: Uuid,
    created_at: DateTime,
}

impl From<VoteEntity> for VoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            voter_id: value.voter_id,
            submission_id: value.submission_id,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<VoteDocument> for VoteEntity {
    fn from(value: VoteDocument) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            voter_id: value.voter_id,
            submission_id: value.submission_id,
            created_at: value.created_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
