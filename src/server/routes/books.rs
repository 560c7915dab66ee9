use super::SearchQuery;
use crate::auth::Operation;
use crate::models::{Book, BookPatch, NewBook};
use crate::server::{ApiError, AppState, Caller};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books", get(list_books_handler).post(create_book_handler))
        .route(
            "/books/{id}",
            get(get_book_handler)
                .put(update_book_handler)
                .delete(delete_book_handler),
        )
}

/// GET /api/books?q=
async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let books = state.books.search(query.q.as_deref().unwrap_or("")).await?;
    Ok(Json(books))
}

/// GET /api/books/{id}
async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(state.books.get(id).await?))
}

/// POST /api/books
async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(book): Json<NewBook>,
) -> Result<impl IntoResponse, ApiError> {
    caller.authorize(Operation::WriteCatalog)?;
    let created = state.books.create(&book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/books/{id}
async fn update_book_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(patch): Json<BookPatch>,
) -> Result<Json<Book>, ApiError> {
    caller.authorize(Operation::WriteCatalog)?;
    Ok(Json(state.books.update(id, &patch).await?))
}

/// DELETE /api/books/{id}
async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.authorize(Operation::WriteCatalog)?;
    state.books.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
