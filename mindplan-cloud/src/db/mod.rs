//! Database access layer

pub mod subscriptions;
pub mod webhook_events;
