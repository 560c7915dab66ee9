use crate::clock::Clock;
use crate::db;
use crate::models::{NewBook, Role};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

/// Fresh in-memory database with the schema applied.
///
/// One connection only: every connection to `sqlite::memory:` is its own
/// database.
pub async fn memory_pool() -> SqlitePool {
    let pool = db::connect("sqlite::memory:", 1).await.expect("memory pool");
    db::init_schema(&pool).await.expect("schema");
    pool
}

/// Fresh on-disk database with several pooled connections, so concurrent
/// transactions really contend for SQLite's locks.
///
/// Keep the returned directory alive for the life of the pool.
pub async fn file_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("librarium.db").display());
    let pool = db::open(&url, 8).await.expect("file pool");
    (dir, pool)
}

/// Settable clock for fine and reminder arithmetic.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32) -> Self {
        Self::new(
            Utc.with_ymd_and_hms(year, month, day, hour, min, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub fn new_book(title: &str, stock: i64) -> NewBook {
    NewBook {
        title: title.to_string(),
        author: String::new(),
        category: String::new(),
        stock,
        image_url: None,
        published_year: None,
    }
}

/// Insert a user row directly, bypassing password hashing.
pub async fn seed_user(pool: &SqlitePool, username: &str, role: Role) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, username, password_hash, role, created_at)
         VALUES (?, ?, 'x', ?, ?)",
    )
    .bind(id)
    .bind(username)
    .bind(role)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed user");
    id
}

pub async fn seed_book(pool: &SqlitePool, title: &str, stock: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO books (title, stock, created_at) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(title)
    .bind(stock)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .expect("seed book")
}

pub async fn book_stock(pool: &SqlitePool, book_id: i64) -> i64 {
    sqlx::query_scalar("SELECT stock FROM books WHERE id = ?")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .expect("book stock")
}

pub async fn active_loans(pool: &SqlitePool, user_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE user_id = ? AND status = 'borrowed'")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("active loans")
}
