use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account roles. Everything except `Admin` is a member role.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    Student,
    Teacher,
    Staff,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Staff => "staff",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `users` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub fullname: Option<String>,
    pub nip: Option<String>,
    pub contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration input, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub fullname: Option<String>,
    pub nip: Option<String>,
    pub contact: Option<String>,
}

/// Admin edit of another account. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub fullname: Option<String>,
    pub nip: Option<String>,
    pub contact: Option<String>,
    pub role: Option<Role>,
}

/// Self-service profile edit
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub fullname: Option<String>,
    pub nip: Option<String>,
    pub contact: Option<String>,
    pub password_hash: Option<String>,
}
