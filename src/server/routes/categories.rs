use crate::auth::Operation;
use crate::models::Category;
use crate::server::{ApiError, AppState, Caller};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/categories",
            get(list_categories_handler).post(create_category_handler),
        )
        .route("/categories/{id}", delete(delete_category_handler))
}

#[derive(Deserialize)]
struct CreateCategoryRequest {
    name: String,
}

/// GET /api/categories
async fn list_categories_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<Category>>, ApiError> {
    caller.authorize(Operation::ReadCategories)?;
    Ok(Json(state.categories.list().await?))
}

/// POST /api/categories
async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.authorize(Operation::WriteCatalog)?;
    let category = state.categories.create(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// DELETE /api/categories/{id}
async fn delete_category_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.authorize(Operation::WriteCatalog)?;
    state.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
