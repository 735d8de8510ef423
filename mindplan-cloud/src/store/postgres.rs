use async_trait::async_trait;
use sqlx::PgPool;

use shared::TimeBox;

use super::{BoxError, CheckoutCompleted, StatusSync, SubscriptionRecord, SubscriptionStore};
use crate::db;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn find_latest(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, BoxError> {
        let row = db::subscriptions::find_latest(&self.pool, user_id).await?;
        Ok(row.map(SubscriptionRecord::from))
    }

    async fn create_default(
        &self,
        user_id: &str,
        now: i64,
    ) -> Result<SubscriptionRecord, BoxError> {
        let id = shared::util::snowflake_id();
        let row = db::subscriptions::create_default(&self.pool, id, user_id, now).await?;
        Ok(row.into())
    }

    async fn downgrade(&self, id: i64, expired: TimeBox, now: i64) -> Result<bool, BoxError> {
        Ok(db::subscriptions::downgrade(&self.pool, id, expired, now).await?)
    }

    async fn set_customer(
        &self,
        user_id: &str,
        customer_id: &str,
        now: i64,
    ) -> Result<(), BoxError> {
        Ok(db::subscriptions::set_customer(&self.pool, user_id, customer_id, now).await?)
    }

    async fn upsert_checkout(&self, checkout: &CheckoutCompleted<'_>) -> Result<(), BoxError> {
        db::subscriptions::upsert_checkout(
            &self.pool,
            shared::util::snowflake_id(),
            checkout.user_id,
            checkout.stripe_customer_id,
            checkout.stripe_subscription_id,
            checkout.now,
        )
        .await?;
        Ok(())
    }

    async fn sync_status(&self, sync: &StatusSync<'_>) -> Result<bool, BoxError> {
        Ok(db::subscriptions::sync_status(
            &self.pool,
            sync.stripe_subscription_id,
            sync.status,
            sync.current_period_end,
            sync.trial_end,
            sync.now,
        )
        .await?)
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        event_type: &str,
        now: i64,
    ) -> Result<bool, BoxError> {
        Ok(db::webhook_events::record(&self.pool, event_id, event_type, now).await?)
    }

    async fn forget_webhook_event(&self, event_id: &str) -> Result<(), BoxError> {
        Ok(db::webhook_events::forget(&self.pool, event_id).await?)
    }
}
