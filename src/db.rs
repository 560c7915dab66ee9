//! SQLite pool creation and schema bootstrap.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Executor;
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    "
    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        fullname TEXT,
        nip TEXT,
        contact TEXT,
        created_at TEXT NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        author TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT '',
        stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
        image_url TEXT,
        published_year INTEGER,
        created_at TEXT NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS loans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id BLOB NOT NULL,
        book_id INTEGER NOT NULL,
        loan_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        return_date TEXT,
        status TEXT NOT NULL,
        fine INTEGER NOT NULL DEFAULT 0 CHECK (fine >= 0),
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (book_id) REFERENCES books(id)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_loans_user_status ON loans(user_id, status)",
    "
    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY,
        max_loan_books INTEGER NOT NULL DEFAULT 3,
        loan_duration INTEGER NOT NULL DEFAULT 7,
        fine_per_day INTEGER NOT NULL DEFAULT 5000
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id BLOB NOT NULL,
        message TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, message)",
    "
    CREATE TABLE IF NOT EXISTS sessions (
        token_hash TEXT PRIMARY KEY,
        user_id BLOB NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id)
    )
    ",
];

/// Open a pool against `database_url`, creating the database file if needed.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("invalid database url {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
        .context("connecting to database")?;

    Ok(pool)
}

/// Create tables if absent and seed the default loan policy row.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        pool.execute(*statement)
            .await
            .with_context(|| format!("executing schema statement: {}", statement.trim()))?;
    }

    sqlx::query(
        "INSERT OR IGNORE INTO settings (id, max_loan_books, loan_duration, fine_per_day)
         VALUES (1, 3, 7, 5000)",
    )
    .execute(pool)
    .await
    .context("seeding default settings")?;

    tracing::debug!("schema ready");
    Ok(())
}

/// Connect and bootstrap in one step
pub async fn open(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = connect(database_url, max_connections).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Whether an error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false)
}

/// Whether an error is a FOREIGN KEY constraint violation
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_foreign_key_violation())
        .unwrap_or(false)
}
