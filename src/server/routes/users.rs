//! Admin user management.

use super::SearchQuery;
use crate::auth::Operation;
use crate::models::{User, UserPatch};
use crate::server::{ApiError, AppState, Caller};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users_handler))
        .route("/users/{id}", put(update_user_handler).delete(delete_user_handler))
}

/// GET /api/users?q=
async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    caller.authorize(Operation::ManageUsers)?;
    let users = state.users.search(query.q.as_deref().unwrap_or("")).await?;
    Ok(Json(users))
}

/// PUT /api/users/{id}
async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let admin = caller.authorize(Operation::ManageUsers)?;
    if admin.user_id == id && matches!(patch.role, Some(role) if !role.is_admin()) {
        return Err(ApiError::bad_request("cannot remove your own admin role"));
    }
    Ok(Json(state.users.update(id, &patch).await?))
}

/// DELETE /api/users/{id}
async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let admin = caller.authorize(Operation::ManageUsers)?;
    if admin.user_id == id {
        return Err(ApiError::bad_request("cannot delete your own account"));
    }
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
