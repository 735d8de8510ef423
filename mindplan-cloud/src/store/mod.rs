//! Subscription persistence seam
//!
//! Handlers and the subscription service talk to [`SubscriptionStore`];
//! production uses [`PgSubscriptionStore`], unit tests use the in-memory
//! store.

mod postgres;
#[cfg(test)]
pub mod memory;

pub use postgres::PgSubscriptionStore;

use async_trait::async_trait;
use shared::{PlanType, Subscription, SubscriptionStatus, TimeBox};

use crate::db::subscriptions::SubscriptionRow;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A subscription row: the entitlement fields plus billing bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub id: i64,
    pub subscription: Subscription,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<i64>,
    pub updated_at: i64,
}

impl From<SubscriptionRow> for SubscriptionRecord {
    fn from(row: SubscriptionRow) -> Self {
        // Unknown values fail closed: they never grant premium.
        let plan_type = PlanType::from_db(&row.plan_type).unwrap_or_else(|| {
            tracing::warn!(user_id = %row.user_id, plan_type = %row.plan_type, "Unknown plan_type, treating as free");
            PlanType::Free
        });
        let status = SubscriptionStatus::from_db(&row.status).unwrap_or_else(|| {
            tracing::warn!(user_id = %row.user_id, status = %row.status, "Unknown status, treating as cancelled");
            SubscriptionStatus::Cancelled
        });

        Self {
            id: row.id,
            subscription: Subscription {
                user_id: row.user_id,
                plan_type,
                status,
                trial_end: row.trial_end,
                beta_end: row.beta_end,
                is_beta_tester: row.is_beta_tester,
                created_at: row.created_at,
            },
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            current_period_end: row.current_period_end,
            updated_at: row.updated_at,
        }
    }
}

/// `checkout.session.completed` mapped onto local fields
#[derive(Debug, Clone)]
pub struct CheckoutCompleted<'a> {
    pub user_id: &'a str,
    pub stripe_customer_id: Option<&'a str>,
    pub stripe_subscription_id: &'a str,
    pub now: i64,
}

/// Provider-side status change for a Stripe subscription
#[derive(Debug, Clone)]
pub struct StatusSync<'a> {
    pub stripe_subscription_id: &'a str,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<i64>,
    pub trial_end: Option<i64>,
    pub now: i64,
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Most recent record for the user
    async fn find_latest(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, BoxError>;

    /// Insert the default `free/active` record
    async fn create_default(&self, user_id: &str, now: i64)
    -> Result<SubscriptionRecord, BoxError>;

    /// Conditional downgrade of record `id` from an expired time box;
    /// `true` if the row changed
    async fn downgrade(&self, id: i64, expired: TimeBox, now: i64) -> Result<bool, BoxError>;

    async fn set_customer(&self, user_id: &str, customer_id: &str, now: i64)
    -> Result<(), BoxError>;

    async fn upsert_checkout(&self, checkout: &CheckoutCompleted<'_>) -> Result<(), BoxError>;

    /// Restore `premium` with the provider's status; `true` if a local row
    /// carries the provider subscription ID
    async fn sync_status(&self, sync: &StatusSync<'_>) -> Result<bool, BoxError>;

    /// `false` if the event ID was already recorded
    async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        now: i64,
    ) -> Result<bool, BoxError>;

    async fn forget_webhook_event(&self, event_id: &str) -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(plan_type: &str, status: &str) -> SubscriptionRow {
        SubscriptionRow {
            id: 1,
            user_id: "user-1".into(),
            plan_type: plan_type.into(),
            status: status.into(),
            trial_end: None,
            beta_end: Some(5),
            is_beta_tester: true,
            stripe_customer_id: Some("cus_1".into()),
            stripe_subscription_id: None,
            current_period_end: None,
            created_at: 10,
            updated_at: 20,
        }
    }

    #[test]
    fn row_converts_to_record() {
        let record = SubscriptionRecord::from(row("premium", "beta"));
        assert_eq!(record.subscription.plan_type, PlanType::Premium);
        assert_eq!(record.subscription.status, SubscriptionStatus::Beta);
        assert_eq!(record.subscription.beta_end, Some(5));
        assert!(record.subscription.is_beta_tester);
        assert_eq!(record.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[test]
    fn unknown_values_fail_closed() {
        let record = SubscriptionRecord::from(row("platinum", "trialing"));
        assert_eq!(record.subscription.plan_type, PlanType::Free);
        assert_eq!(record.subscription.status, SubscriptionStatus::Cancelled);

        let record = SubscriptionRecord::from(row("premium", "mystery"));
        assert!(!shared::subscription::is_premium(
            Some(&record.subscription),
            0
        ));
    }
}
