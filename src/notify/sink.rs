//! Per-user notification feed.
//!
//! Rows are append-only and unique per `(user, message)`: writing the same
//! text twice for a user is a no-op. Every new row is also pushed to the
//! user's live connections.

use super::hub::HubHandle;
use crate::clock::Clock;
use crate::metrics::Metrics;
use crate::models::Notification;
use crate::store_error::{StoreError, StoreResult};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Recipient of an admin message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    User(Uuid),
    All,
}

impl Recipient {
    /// `"all"` or a user id
    pub fn parse(target: &str) -> Option<Self> {
        let target = target.trim();
        if target.eq_ignore_ascii_case("all") {
            return Some(Recipient::All);
        }
        Uuid::parse_str(target).ok().map(Recipient::User)
    }
}

#[derive(Clone)]
pub struct NotificationSink {
    pool: SqlitePool,
    hub: HubHandle,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl NotificationSink {
    pub fn new(pool: SqlitePool, hub: HubHandle, clock: Arc<dyn Clock>, metrics: Metrics) -> Self {
        Self {
            pool,
            hub,
            clock,
            metrics,
        }
    }

    /// Append `message` to the user's feed unless it is already there.
    ///
    /// Returns whether a row was written.
    pub async fn create(&self, user_id: Uuid, message: &str) -> StoreResult<bool> {
        let inserted = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, message, is_read, created_at)
             SELECT ?1, ?2, 0, ?3
             WHERE NOT EXISTS (SELECT 1 FROM notifications WHERE user_id = ?1 AND message = ?2)
             RETURNING id, user_id, message, is_read, created_at",
        )
        .bind(user_id)
        .bind(message)
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await?;

        let Some(notification) = inserted else {
            tracing::trace!(user_id = %user_id, "duplicate notification skipped");
            return Ok(false);
        };

        self.metrics.notifications_created.inc();
        self.hub.send(user_id, push_frame(&notification));
        Ok(true)
    }

    /// Like [`create`](Self::create) but only logs failures. Used after a
    /// loan operation has already committed.
    pub async fn emit(&self, user_id: Uuid, message: &str) {
        if let Err(e) = self.create(user_id, message).await {
            tracing::warn!(user_id = %user_id, error = %e, "failed to write notification");
        }
    }

    /// Newest first
    pub async fn list(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, message, is_read, created_at FROM notifications
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn mark_read(&self, user_id: Uuid, id: i64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("notification"));
        }
        Ok(())
    }

    pub async fn delete(&self, user_id: Uuid, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("notification"));
        }
        Ok(())
    }

    /// Admin message to one user or to everyone. Returns rows written.
    pub async fn send(&self, recipient: Recipient, message: &str) -> StoreResult<u64> {
        let message = message.trim();
        if message.is_empty() {
            return Err(StoreError::Validation("message is required".to_string()));
        }

        let targets: Vec<Uuid> = match recipient {
            Recipient::User(user_id) => {
                let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await?;
                vec![exists.ok_or(StoreError::NotFound("user"))?]
            }
            Recipient::All => {
                sqlx::query_scalar("SELECT id FROM users")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut written = 0;
        for user_id in &targets {
            if self.create(*user_id, message).await? {
                written += 1;
            }
        }

        tracing::info!(recipients = targets.len(), written, "admin notification sent");
        Ok(written)
    }
}

fn push_frame(notification: &Notification) -> String {
    json!({
        "type": "notification",
        "id": notification.id,
        "message": notification.message,
        "created_at": notification.created_at,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::notify::hub::NotificationHub;
    use crate::test_utils::{memory_pool, seed_user, FixedClock};
    use tokio::sync::mpsc;

    async fn sink() -> (NotificationSink, SqlitePool, HubHandle) {
        let pool = memory_pool().await;
        let hub = NotificationHub::start();
        let sink = NotificationSink::new(
            pool.clone(),
            hub.clone(),
            Arc::new(FixedClock::at(2024, 5, 1, 8, 0)),
            Metrics::new().unwrap(),
        );
        (sink, pool, hub)
    }

    #[tokio::test]
    async fn test_create_deduplicates() {
        let (sink, pool, _hub) = sink().await;
        let ana = seed_user(&pool, "ana", Role::Student).await;
        let bob = seed_user(&pool, "bob", Role::Student).await;

        assert!(sink.create(ana, "Borrowed: Dune").await.unwrap());
        assert!(!sink.create(ana, "Borrowed: Dune").await.unwrap());
        assert!(sink.create(bob, "Borrowed: Dune").await.unwrap());

        assert_eq!(sink.list(ana).await.unwrap().len(), 1);
        assert_eq!(sink.metrics.notifications_created.get(), 2);
    }

    #[tokio::test]
    async fn test_create_pushes_frame() {
        let (sink, pool, hub) = sink().await;
        let ana = seed_user(&pool, "ana", Role::Student).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.register(ana, tx);

        sink.create(ana, "hello").await.unwrap();
        let frame = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame.json).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["message"], "hello");
        assert!(value["id"].as_i64().is_some());
        assert_eq!(value["created_at"], "2024-05-01T08:00:00Z");

        // Duplicates are not pushed again.
        sink.create(ana, "hello").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_and_delete_are_owner_scoped() {
        let (sink, pool, _hub) = sink().await;
        let ana = seed_user(&pool, "ana", Role::Student).await;
        let bob = seed_user(&pool, "bob", Role::Student).await;
        sink.create(ana, "one").await.unwrap();
        let id = sink.list(ana).await.unwrap()[0].id;

        assert!(matches!(sink.mark_read(bob, id).await, Err(StoreError::NotFound(_))));
        assert_eq!(sink.unread_count(ana).await.unwrap(), 1);
        sink.mark_read(ana, id).await.unwrap();
        assert_eq!(sink.unread_count(ana).await.unwrap(), 0);
        assert!(sink.list(ana).await.unwrap()[0].is_read);

        assert!(matches!(sink.delete(bob, id).await, Err(StoreError::NotFound(_))));
        sink.delete(ana, id).await.unwrap();
        assert!(sink.list(ana).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_direct_and_broadcast() {
        let (sink, pool, _hub) = sink().await;
        let ana = seed_user(&pool, "ana", Role::Student).await;
        let bob = seed_user(&pool, "bob", Role::Teacher).await;

        assert_eq!(sink.send(Recipient::User(ana), "Library closed Friday").await.unwrap(), 1);
        assert_eq!(sink.send(Recipient::All, "Library closed Friday").await.unwrap(), 1);
        assert_eq!(sink.list(bob).await.unwrap().len(), 1);

        assert!(matches!(
            sink.send(Recipient::User(Uuid::new_v4()), "hi").await,
            Err(StoreError::NotFound("user"))
        ));
        assert!(matches!(
            sink.send(Recipient::All, "  ").await,
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_recipient_parse() {
        let id = Uuid::new_v4();
        assert_eq!(Recipient::parse("all"), Some(Recipient::All));
        assert_eq!(Recipient::parse(&id.to_string()), Some(Recipient::User(id)));
        assert_eq!(Recipient::parse("bob"), None);
    }
}
