//! Librarium - library management backend
//!
//! Catalog, members, loans with fines, and per-user notifications pushed
//! over a live WebSocket channel, served as a JSON API over SQLite.

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod loans;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod server;
pub mod settings;
pub mod store_error;
pub mod sweep;
pub mod users;

#[cfg(test)]
mod test_utils;

// Re-export Args for the binary
pub use cli::Args;
