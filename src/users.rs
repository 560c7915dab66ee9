//! Account storage.
//!
//! Passwords arrive here already hashed; see `auth::password`.

use crate::clock::Clock;
use crate::db::is_unique_violation;
use crate::models::{NewUser, ProfilePatch, User, UserPatch};
use crate::store_error::{StoreError, StoreResult};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, password_hash, role, fullname, nip, contact, created_at";

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl UserStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn create(&self, user: &NewUser) -> StoreResult<User> {
        let username = user.username.trim();
        if username.is_empty() {
            return Err(StoreError::Validation("username is required".to_string()));
        }

        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, password_hash, role, fullname, nip, contact, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(&user.fullname)
        .bind(&user.nip)
        .bind(&user.contact)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("username '{}' is taken", username))
            } else {
                StoreError::Database(e)
            }
        })?;

        tracing::info!(user_id = %created.id, username = %created.username, role = %created.role, "user registered");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("user"))
    }

    pub async fn get_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
                .bind(username.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    pub async fn list(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Case-insensitive match on username, full name or member number.
    pub async fn search(&self, query: &str) -> StoreResult<Vec<User>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list().await;
        }

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE instr(lower(username), lower(?1)) > 0
                OR instr(lower(COALESCE(fullname, '')), lower(?1)) > 0
                OR instr(lower(COALESCE(nip, '')), lower(?1)) > 0
             ORDER BY username"
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn update(&self, id: Uuid, patch: &UserPatch) -> StoreResult<User> {
        let updated = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                fullname = COALESCE(?, fullname),
                nip = COALESCE(?, nip),
                contact = COALESCE(?, contact),
                role = COALESCE(?, role)
             WHERE id = ?
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&patch.fullname)
        .bind(&patch.nip)
        .bind(&patch.contact)
        .bind(patch.role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))?;

        if let Some(role) = patch.role {
            tracing::info!(user_id = %id, role = %role, "user role changed");
        }
        Ok(updated)
    }

    pub async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET
                fullname = COALESCE(?, fullname),
                nip = COALESCE(?, nip),
                contact = COALESCE(?, contact),
                password_hash = COALESCE(?, password_hash)
             WHERE id = ?
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&patch.fullname)
        .bind(&patch.nip)
        .bind(&patch.contact)
        .bind(&patch.password_hash)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("user"))
    }

    /// Remove a user with their sessions, notifications and loans.
    ///
    /// Stock held by the user's outstanding loans goes back on the shelf
    /// in the same transaction.
    pub async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let restored = sqlx::query(
            "UPDATE books SET stock = stock + (
                SELECT COUNT(*) FROM loans
                WHERE loans.book_id = books.id AND loans.user_id = ?1 AND loans.status = 'borrowed'
             )
             WHERE id IN (SELECT book_id FROM loans WHERE user_id = ?1 AND status = 'borrowed')",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for table in ["sessions", "notifications", "loans"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE user_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }

        tx.commit().await?;
        tracing::info!(user_id = %id, books_restored = restored, "user deleted");
        Ok(())
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
