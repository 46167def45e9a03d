use crate::model::role::Role;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize, Display, From, ToSchema,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// argon2 PHC string
    pub password: String,
    pub role: Role,
}

pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Caller {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRef {
    #[schema(example = 7, value_type = u64)]
    pub id: UserId,
    #[schema(example = "alice")]
    pub username: String,
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        UserRef {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[inline]
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
