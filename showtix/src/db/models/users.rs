//! Database models for users mirrored from the identity provider.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for creating or refreshing a mirrored user.
///
/// User lifecycle is owned by the external identity provider; this request
/// carries whatever the latest lifecycle event said about the user.
#[derive(Debug, Clone)]
pub struct UserUpsertDBRequest {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub is_admin: bool,
}

/// Database response for a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
