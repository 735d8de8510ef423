//! Business services

pub mod subscription;

pub use subscription::{SubscriptionService, SubscriptionView};
