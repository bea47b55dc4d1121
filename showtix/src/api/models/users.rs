//! API request/response models for users, favorites and the identity
//! provider's webhook payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::users::{UserDBResponse, UserUpsertDBRequest};
use crate::types::{MovieId, UserId};

/// A mirrored user profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    /// Identity-provider user id
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            image: db.image,
            is_admin: db.is_admin,
            created_at: db.created_at,
        }
    }
}

/// The authenticated user resolved from the trusted proxy header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            is_admin: db.is_admin,
        }
    }
}

/// Body of `POST /api/v1/users/me/favorites`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteToggleRequest {
    pub movie_id: MovieId,
}

/// Whether the movie ended up favorited after the toggle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FavoriteToggleResponse {
    pub favorited: bool,
}

/// Response for the admin role probe.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IsAdminResponse {
    pub is_admin: bool,
}

/// An identity-provider lifecycle event (`user.created`, `user.updated`,
/// `user.deleted`).
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: IdentityUserData,
}

/// The user object embedded in an identity event.
///
/// Delete events carry only the id, so everything else defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityUserData {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    pub email_addresses: Vec<IdentityEmailAddress>,
    pub private_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEmailAddress {
    pub email_address: String,
}

impl IdentityUserData {
    pub fn full_name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(first) = self.first_name.as_deref().filter(|s| !s.is_empty()) {
            parts.push(first);
        }
        if let Some(last) = self.last_name.as_deref().filter(|s| !s.is_empty()) {
            parts.push(last);
        }
        parts.join(" ")
    }

    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses.first().map(|e| e.email_address.as_str())
    }

    /// The provider stores the admin role in the user's private metadata.
    pub fn is_admin(&self) -> bool {
        self.private_metadata.get("role").and_then(|v| v.as_str()) == Some("admin")
    }

    /// Build the mirror upsert. `None` when the event carries no email
    /// address, which create/update events always do.
    pub fn to_db_request(&self) -> Option<UserUpsertDBRequest> {
        let email = self.primary_email()?.to_string();

        Some(UserUpsertDBRequest {
            id: self.id.clone(),
            name: self.full_name(),
            email,
            image: self.image_url.clone(),
            is_admin: self.is_admin(),
        })
    }
}
