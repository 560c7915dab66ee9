//! Opaque bearer sessions.
//!
//! The token handed to the client is 32 random bytes, base64url encoded.
//! Only its SHA-256 digest is stored.

use super::{AuthError, Identity};
use crate::clock::Clock;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(pool: SqlitePool, ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self { pool, ttl, clock }
    }

    /// Open a session and return the clear token.
    pub async fn create(&self, user_id: Uuid) -> Result<String, AuthError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let now = self.clock.now();
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token_hash(&token))
        .bind(user_id)
        .bind(now)
        .bind(now + self.ttl)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Identity behind a token, if the session exists and has not expired.
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT u.id AS user_id, u.username, u.role
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ? AND s.expires_at > ?",
        )
        .bind(token_hash(token))
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    pub async fn destroy(&self, token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop expired sessions, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(self.clock.now())
            .execute(&self.pool)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }
        Ok(purged)
    }
}

fn token_hash(token: &str) -> String {
    STANDARD.encode(Sha256::digest(token.as_bytes()))
}
