//! Notification feed and live push.

pub mod hub;
pub mod messages;
pub mod sink;

pub use hub::{HubHandle, NotificationHub, PushMessage};
pub use sink::{NotificationSink, Recipient};
