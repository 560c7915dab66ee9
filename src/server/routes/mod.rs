//! JSON API under `/api`.

mod auth;
mod books;
mod categories;
mod loans;
mod notifications;
mod users;

use super::AppState;
use axum::Router;
use serde::{Deserialize, Deserializer};
use secrecy::SecretString;
use std::sync::Arc;

pub fn api() -> Router<Arc<AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(books::routes())
        .merge(categories::routes())
        .merge(loans::routes())
        .merge(notifications::routes())
}

/// `?q=` search parameter
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

pub(crate) fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

pub(crate) fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.is_empty())
        .map(SecretString::from))
}
