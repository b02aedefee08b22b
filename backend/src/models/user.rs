//! Models that represent members known through the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
/// Database representation of a member.
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Immutable subject identifier issued by the identity provider.
    pub sub: String,
    /// Email address, refreshed from each login token.
    pub email: String,
    /// Display name, refreshed from each login token.
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Identity attributes taken from a verified login token.
pub struct UserIdentity {
    pub sub: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
/// Public-facing representation of a user returned by the API.
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_response_hides_subject() {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            sub: "idp|42".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["name"], "Ada");
        assert!(json.get("sub").is_none());
    }
}
