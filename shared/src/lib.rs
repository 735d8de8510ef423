//! Shared types for MindPlan
//!
//! Error system, API response envelope and the subscription model with its
//! entitlement rules. Used by `mindplan-cloud` and kept free of I/O so the
//! rules can be tested in isolation.

pub mod error;
pub mod subscription;
pub mod util;

pub use subscription::{PlanType, Subscription, SubscriptionStatus, Tier, TimeBox};
