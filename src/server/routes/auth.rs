//! Registration, login and the caller's own profile.

use super::{optional_secret, secret};
use crate::auth::{self, password, Operation};
use crate::models::{NewUser, ProfilePatch, Role, User};
use crate::server::extract::SESSION_COOKIE;
use crate::server::{ApiError, AppState, Caller};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/profile", get(profile_handler).put(update_profile_handler))
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    #[serde(deserialize_with = "secret")]
    password: SecretString,
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default)]
    nip: Option<String>,
    #[serde(default)]
    contact: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    #[serde(deserialize_with = "secret")]
    password: SecretString,
}

#[derive(Deserialize)]
struct ProfileRequest {
    #[serde(default)]
    fullname: Option<String>,
    #[serde(default)]
    nip: Option<String>,
    #[serde(default)]
    contact: Option<String>,
    #[serde(default, deserialize_with = "optional_secret")]
    password: Option<SecretString>,
}

/// Runs argon2 on the blocking pool.
async fn hash_password(password: SecretString) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || password::hash(password.expose_secret()))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

/// POST /api/register
async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.password.expose_secret().is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    // Only the very first account may register itself as admin.
    let role = req.role.unwrap_or_default();
    if role.is_admin() && state.users.count().await? > 0 {
        return Err(ApiError::forbidden("admin accounts are created by an admin"));
    }

    let user = state
        .users
        .create(&NewUser {
            username: req.username,
            password_hash: hash_password(req.password).await?,
            role,
            fullname: req.fullname,
            nip: req.nip,
            contact: req.contact,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/login
async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (token, identity) = auth::login(
        &state.users,
        &state.sessions,
        &req.username,
        req.password.expose_secret(),
    )
    .await?;

    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        state.session_ttl.num_seconds()
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "token": token, "user": identity })),
    ))
}

/// POST /api/logout
async fn logout_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.destroy(&caller.token).await?;
    tracing::info!(user_id = %caller.identity.user_id, "logout");

    let cookie = format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    Ok(([(header::SET_COOKIE, cookie)], StatusCode::NO_CONTENT))
}

/// GET /api/profile
async fn profile_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<User>, ApiError> {
    let me = caller.authorize(Operation::ViewProfile)?;
    Ok(Json(state.users.get(me.user_id).await?))
}

/// PUT /api/profile
async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let me = caller.authorize(Operation::UpdateProfile)?;

    let password_hash = match req.password {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let user = state
        .users
        .update_profile(
            me.user_id,
            &ProfilePatch {
                fullname: req.fullname,
                nip: req.nip,
                contact: req.contact,
                password_hash,
            },
        )
        .await?;
    Ok(Json(user))
}
