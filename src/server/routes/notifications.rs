use crate::auth::Operation;
use crate::models::Notification;
use crate::notify::Recipient;
use crate::server::{ApiError, AppState, Caller};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_handler))
        .route("/notifications/unread", get(unread_handler))
        .route("/notifications/send", post(send_handler))
        .route("/notifications/{id}/read", post(mark_read_handler))
        .route("/notifications/{id}", delete(delete_handler))
}

#[derive(Deserialize)]
struct SendRequest {
    /// User id or `"all"`
    target: String,
    message: String,
}

/// GET /api/notifications
async fn list_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let me = caller.authorize(Operation::OwnNotifications)?;
    Ok(Json(state.notifications.list(me.user_id).await?))
}

/// GET /api/notifications/unread
async fn unread_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Value>, ApiError> {
    let me = caller.authorize(Operation::OwnNotifications)?;
    let unread = state.notifications.unread_count(me.user_id).await?;
    Ok(Json(json!({ "unread": unread })))
}

/// POST /api/notifications/{id}/read
async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let me = caller.authorize(Operation::OwnNotifications)?;
    state.notifications.mark_read(me.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/notifications/{id}
async fn delete_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let me = caller.authorize(Operation::OwnNotifications)?;
    state.notifications.delete(me.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/notifications/send
async fn send_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<SendRequest>,
) -> Result<Json<Value>, ApiError> {
    caller.authorize(Operation::SendNotifications)?;
    let recipient = Recipient::parse(&req.target)
        .ok_or_else(|| ApiError::bad_request("target must be a user id or \"all\""))?;
    let written = state.notifications.send(recipient, &req.message).await?;
    Ok(Json(json!({ "sent": written })))
}

#[cfg(test)]
mod tests {
    use crate::models::Role;
    use crate::server::test_support::TestApp;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_feed_lifecycle() {
        let app = TestApp::new().await;
        let admin = app.login_as("root", Role::Admin).await;
        let ana = app.login_as("ana", Role::Student).await;

        let (status, body) = app
            .call(
                "POST",
                "/api/notifications/send",
                Some(&admin),
                Some(json!({"target": "all", "message": "Closed on Friday"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent"], 2);

        let (_, feed) = app.call("GET", "/api/notifications", Some(&ana), None).await;
        assert_eq!(feed.as_array().unwrap().len(), 1);
        assert_eq!(feed[0]["is_read"], false);
        let (_, unread) = app
            .call("GET", "/api/notifications/unread", Some(&ana), None)
            .await;
        assert_eq!(unread["unread"], 1);
        let id = feed[0]["id"].as_i64().unwrap();

        let read = format!("/api/notifications/{}/read", id);
        let (status, _) = app.call("POST", &read, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.call("POST", &read, Some(&ana), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, feed) = app.call("GET", "/api/notifications", Some(&ana), None).await;
        assert_eq!(feed[0]["is_read"], true);
        let (_, unread) = app
            .call("GET", "/api/notifications/unread", Some(&ana), None)
            .await;
        assert_eq!(unread["unread"], 0);

        let (status, _) = app
            .call("DELETE", &format!("/api/notifications/{}", id), Some(&ana), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, feed) = app.call("GET", "/api/notifications", Some(&ana), None).await;
        assert!(feed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_admin_and_valid_target() {
        let app = TestApp::new().await;
        let admin = app.login_as("root", Role::Admin).await;
        let ana = app.login_as("ana", Role::Student).await;

        let body = json!({"target": "all", "message": "hi"});
        let (status, _) = app
            .call("POST", "/api/notifications/send", Some(&ana), Some(body))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let body = json!({"target": "bob", "message": "hi"});
        let (status, _) = app
            .call("POST", "/api/notifications/send", Some(&admin), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
