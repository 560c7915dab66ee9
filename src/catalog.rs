//! Catalog store: books and categories.
//!
//! No loan rules live here. Stock is only written on create and on an
//! explicit admin correction; the loan engine owns the borrow/return path.

use crate::clock::Clock;
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::models::{Book, BookPatch, Category, NewBook};
use crate::store_error::{StoreError, StoreResult};
use sqlx::SqlitePool;
use std::sync::Arc;

const BOOK_COLUMNS: &str =
    "id, title, author, category, stock, image_url, published_year, created_at";

#[derive(Clone)]
pub struct BookStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl BookStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn create(&self, book: &NewBook) -> StoreResult<Book> {
        let title = book.title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title is required".to_string()));
        }
        if book.stock < 0 {
            return Err(StoreError::Validation("stock must be >= 0".to_string()));
        }

        let created = sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books (title, author, category, stock, image_url, published_year, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(title)
        .bind(book.author.trim())
        .bind(book.category.trim())
        .bind(book.stock)
        .bind(&book.image_url)
        .bind(book.published_year)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(book_id = created.id, title = %created.title, "book created");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> StoreResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("book"))
    }

    /// Newest first
    pub async fn list(&self) -> StoreResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Case-insensitive substring match over title, author and category.
    /// A blank query lists everything.
    pub async fn search(&self, query: &str) -> StoreResult<Vec<Book>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list().await;
        }

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books
             WHERE instr(lower(title), lower(?1)) > 0
                OR instr(lower(author), lower(?1)) > 0
                OR instr(lower(category), lower(?1)) > 0
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    pub async fn update(&self, id: i64, patch: &BookPatch) -> StoreResult<Book> {
        let title = patch.title.as_deref().map(str::trim);
        if title == Some("") {
            return Err(StoreError::Validation("title cannot be empty".to_string()));
        }
        if matches!(patch.stock, Some(stock) if stock < 0) {
            return Err(StoreError::Validation("stock must be >= 0".to_string()));
        }

        let updated = sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET
                title = COALESCE(?, title),
                author = COALESCE(?, author),
                category = COALESCE(?, category),
                stock = COALESCE(?, stock),
                image_url = COALESCE(?, image_url),
                published_year = COALESCE(?, published_year)
             WHERE id = ?
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(title)
        .bind(patch.author.as_deref().map(str::trim))
        .bind(patch.category.as_deref().map(str::trim))
        .bind(patch.stock)
        .bind(&patch.image_url)
        .bind(patch.published_year)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("book"))?;

        if let Some(stock) = patch.stock {
            tracing::info!(book_id = id, stock, "book stock corrected");
        }
        Ok(updated)
    }

    /// Fails with `Conflict` while loans still reference the book.
    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    StoreError::Conflict("book has loan history".to_string())
                } else {
                    StoreError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("book"));
        }

        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }

}

#[derive(Debug, Clone)]
pub struct CategoryStore {
    pool: SqlitePool,
}

impl CategoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ordered by name
    pub async fn list(&self) -> StoreResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn create(&self, name: &str) -> StoreResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("name is required".to_string()));
        }

        sqlx::query_as::<_, Category>("INSERT INTO categories (name) VALUES (?) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("category '{}' already exists", name))
                } else {
                    StoreError::Database(e)
                }
            })
    }

    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("category"));
        }
        Ok(())
    }
}
