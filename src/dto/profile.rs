use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::UserEntity,
    dto::{format_system_time, validation::validate_username},
};

/// Request body for creating a profile for the authenticated user.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateProfileRequest {
    #[validate(custom(function = validate_username))]
    pub username: String,
}

/// Profile returned to the owning user.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub is_bot: bool,
    pub created_at: String,
}

impl From<UserEntity> for ProfileResponse {
    fn from(user: UserEntity) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            is_bot: user.is_bot,
            created_at: format_system_time(user.created_at),
        }
    }
}
