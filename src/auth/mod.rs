//! Authentication: password hashing, session tokens and the role policy.

pub mod password;
pub mod policy;
pub mod session;

use crate::models::Role;
use crate::store_error::StoreError;
use crate::users::UserStore;
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

pub use policy::{allowed, Operation};
pub use session::SessionStore;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthenticated,

    #[error("{0} is not permitted for this account")]
    Forbidden(Operation),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The authenticated caller, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn authorize(&self, op: Operation) -> Result<(), AuthError> {
        if allowed(op, self.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(op))
        }
    }
}

/// Check credentials and open a session.
///
/// Unknown usernames and wrong passwords produce the same error.
pub async fn login(
    users: &UserStore,
    sessions: &SessionStore,
    username: &str,
    password: &str,
) -> Result<(String, Identity), AuthError> {
    let user = users
        .get_by_username(username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !password::verify(password, &user.password_hash) {
        tracing::info!(username = %user.username, "login rejected");
        return Err(AuthError::InvalidCredentials);
    }

    let token = sessions.create(user.id).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "login");

    Ok((
        token,
        Identity {
            user_id: user.id,
            username: user.username,
            role: user.role,
        },
    ))
}
