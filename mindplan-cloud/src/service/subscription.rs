//! Per-session subscription service
//!
//! Owns one user's subscription record. Entitlement queries are pure reads of
//! that record; the only write is [`SubscriptionService::downgrade_if_expired`],
//! which the caller invokes explicitly.

use std::sync::Arc;

use serde::Serialize;
use shared::subscription::{self, Resolution};
use shared::{PlanType, Subscription, SubscriptionStatus, Tier, TimeBox};

use crate::error::ServiceResult;
use crate::store::{SubscriptionRecord, SubscriptionStore};

/// Entitlement snapshot returned to the web app
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub tier: Tier,
    pub is_premium: bool,
    pub trial_days_left: i64,
    pub beta_days_left: i64,
    pub is_beta_tester: bool,
    pub has_billing_account: bool,
    pub current_period_end: Option<i64>,
}

pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    record: SubscriptionRecord,
}

impl SubscriptionService {
    /// Load the user's record, creating the default `free/active` row on
    /// first use.
    pub async fn load(
        store: Arc<dyn SubscriptionStore>,
        user_id: &str,
        now: i64,
    ) -> ServiceResult<Self> {
        let record = fetch_or_create(store.as_ref(), user_id, now).await?;
        Ok(Self { store, record })
    }

    pub fn record(&self) -> &SubscriptionRecord {
        &self.record
    }

    pub fn subscription(&self) -> &Subscription {
        &self.record.subscription
    }

    pub fn user_id(&self) -> &str {
        &self.record.subscription.user_id
    }

    pub fn resolution(&self, now: i64) -> Resolution {
        subscription::resolve(Some(self.subscription()), now)
    }

    pub fn tier(&self, now: i64) -> Tier {
        self.resolution(now).tier
    }

    pub fn is_premium(&self, now: i64) -> bool {
        self.resolution(now).is_premium()
    }

    pub fn days_left(&self, now: i64, time_box: TimeBox) -> i64 {
        subscription::days_left(Some(self.subscription()), now, time_box)
    }

    pub fn view(&self, now: i64) -> SubscriptionView {
        let sub = self.subscription();
        let tier = self.tier(now);
        SubscriptionView {
            plan_type: sub.plan_type,
            status: sub.status,
            tier,
            is_premium: tier.is_premium(),
            trial_days_left: self.days_left(now, TimeBox::Trial),
            beta_days_left: self.days_left(now, TimeBox::Beta),
            is_beta_tester: sub.is_beta_tester,
            has_billing_account: self.record.stripe_customer_id.is_some(),
            current_period_end: self.record.current_period_end,
        }
    }

    /// Re-read the record from the store
    pub async fn refresh(&mut self, now: i64) -> ServiceResult<()> {
        let user_id = self.user_id().to_string();
        self.record = fetch_or_create(self.store.as_ref(), &user_id, now).await?;
        Ok(())
    }

    /// Downgrade an expired trial or beta to `free/active`.
    ///
    /// Returns the time box that expired, if any. The store write is
    /// conditional on the row still being in the expired state; if another
    /// writer got there first the record is re-read instead of patched.
    pub async fn downgrade_if_expired(&mut self, now: i64) -> ServiceResult<Option<TimeBox>> {
        let Some(expired) = self.resolution(now).expired else {
            return Ok(None);
        };

        let user_id = self.user_id().to_string();
        if self.store.downgrade(self.record.id, expired, now).await? {
            tracing::info!(user_id = %user_id, expired = ?expired, "Downgraded expired subscription to free");
            self.record.subscription.apply_downgrade(expired);
            self.record.updated_at = now;
        } else {
            tracing::debug!(user_id = %user_id, "Expired row already changed by another writer, refreshing");
            self.refresh(now).await?;
        }
        Ok(Some(expired))
    }
}

async fn fetch_or_create(
    store: &dyn SubscriptionStore,
    user_id: &str,
    now: i64,
) -> ServiceResult<SubscriptionRecord> {
    if let Some(record) = store.find_latest(user_id).await? {
        return Ok(record);
    }
    tracing::info!(user_id = %user_id, "No subscription row, creating free/active default");
    Ok(store.create_default(user_id, now).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use shared::error::{AppError, ErrorCode};
    use shared::util::DAY_MILLIS;
    use std::sync::atomic::Ordering;

    const NOW: i64 = 1_760_000_000_000;

    fn premium(status: SubscriptionStatus) -> Subscription {
        Subscription {
            plan_type: PlanType::Premium,
            status,
            ..Subscription::new_free("user-1", NOW - 3 * DAY_MILLIS)
        }
    }

    fn error_code(err: crate::error::ServiceError) -> ErrorCode {
        AppError::from(err).code
    }

    #[tokio::test]
    async fn first_load_creates_free_active_default() {
        let store = Arc::new(MemoryStore::new());
        let service = SubscriptionService::load(store.clone(), "user-1", NOW)
            .await
            .unwrap();

        assert_eq!(service.subscription().plan_type, PlanType::Free);
        assert_eq!(service.subscription().status, SubscriptionStatus::Active);
        assert!(!service.is_premium(NOW));
        assert_eq!(store.row_count("user-1"), 1);

        // Second load reuses the row
        SubscriptionService::load(store.clone(), "user-1", NOW)
            .await
            .unwrap();
        assert_eq!(store.row_count("user-1"), 1);
    }

    #[tokio::test]
    async fn load_reads_most_recent_row() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(Subscription::new_free("user-1", NOW - 10));
        store.insert_subscription(premium(SubscriptionStatus::Active));
        store.insert_subscription(Subscription::new_free("user-1", NOW - 20));

        let service = SubscriptionService::load(store, "user-1", NOW).await.unwrap();
        assert_eq!(service.subscription().plan_type, PlanType::Free);
        assert_eq!(service.subscription().created_at, NOW - 10);
    }

    #[tokio::test]
    async fn expired_trial_downgrades_once() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(Subscription {
            trial_end: Some(NOW - 1_000),
            ..premium(SubscriptionStatus::Trial)
        });

        let mut service = SubscriptionService::load(store.clone(), "user-1", NOW)
            .await
            .unwrap();
        assert!(!service.is_premium(NOW));
        assert!(!service.is_premium(NOW));

        assert_eq!(
            service.downgrade_if_expired(NOW).await.unwrap(),
            Some(TimeBox::Trial)
        );
        assert_eq!(service.downgrade_if_expired(NOW).await.unwrap(), None);
        assert_eq!(store.downgrade_writes.load(Ordering::SeqCst), 1);

        let stored = store.latest("user-1").unwrap().subscription;
        assert_eq!(stored.plan_type, PlanType::Free);
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(stored.trial_end, None);
        assert_eq!(service.subscription(), &stored);
    }

    #[tokio::test]
    async fn expired_beta_clears_tester_flag() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(Subscription {
            beta_end: Some(NOW - 1),
            is_beta_tester: true,
            ..premium(SubscriptionStatus::Beta)
        });

        let mut service = SubscriptionService::load(store.clone(), "user-1", NOW)
            .await
            .unwrap();
        assert_eq!(
            service.downgrade_if_expired(NOW).await.unwrap(),
            Some(TimeBox::Beta)
        );

        let stored = store.latest("user-1").unwrap().subscription;
        assert_eq!(stored.plan_type, PlanType::Free);
        assert_eq!(stored.beta_end, None);
        assert!(!stored.is_beta_tester);
    }

    #[tokio::test]
    async fn active_trial_is_left_alone() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(Subscription {
            trial_end: Some(NOW + DAY_MILLIS),
            ..premium(SubscriptionStatus::Trial)
        });

        let mut service = SubscriptionService::load(store.clone(), "user-1", NOW)
            .await
            .unwrap();
        assert!(service.is_premium(NOW));
        assert_eq!(service.days_left(NOW, TimeBox::Trial), 1);
        assert_eq!(service.downgrade_if_expired(NOW).await.unwrap(), None);
        assert_eq!(store.downgrade_writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_provider_update_wins_over_downgrade() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(Subscription {
            trial_end: Some(NOW - 1),
            ..premium(SubscriptionStatus::Trial)
        });
        let mut service = SubscriptionService::load(store.clone(), "user-1", NOW)
            .await
            .unwrap();

        // A checkout webhook lands between the read and the downgrade
        store
            .upsert_checkout(&crate::store::CheckoutCompleted {
                user_id: "user-1",
                stripe_customer_id: Some("cus_1"),
                stripe_subscription_id: "sub_1",
                now: NOW,
            })
            .await
            .unwrap();

        assert_eq!(
            service.downgrade_if_expired(NOW).await.unwrap(),
            Some(TimeBox::Trial)
        );
        assert_eq!(store.downgrade_writes.load(Ordering::SeqCst), 0);
        assert!(service.is_premium(NOW));
        assert_eq!(service.tier(NOW), Tier::PremiumActive);
    }

    #[tokio::test]
    async fn downgrade_touches_only_the_evaluated_row() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(Subscription {
            trial_end: Some(NOW - 1),
            created_at: NOW - 5 * DAY_MILLIS,
            ..premium(SubscriptionStatus::Trial)
        });
        store.insert_subscription(Subscription {
            trial_end: Some(NOW - 1),
            ..premium(SubscriptionStatus::Trial)
        });

        let mut service = SubscriptionService::load(store.clone(), "user-1", NOW)
            .await
            .unwrap();
        let latest_id = service.record().id;
        assert_eq!(
            service.downgrade_if_expired(NOW).await.unwrap(),
            Some(TimeBox::Trial)
        );

        let rows = store.rows("user-1");
        assert_eq!(rows.len(), 2);
        for row in rows {
            if row.id == latest_id {
                assert_eq!(row.subscription.plan_type, PlanType::Free);
            } else {
                assert_eq!(row.subscription.plan_type, PlanType::Premium);
                assert_eq!(row.subscription.status, SubscriptionStatus::Trial);
            }
        }
    }

    #[tokio::test]
    async fn view_reports_entitlement() {
        let store = Arc::new(MemoryStore::new());
        store.insert_subscription(Subscription {
            beta_end: Some(NOW + 2 * DAY_MILLIS),
            is_beta_tester: true,
            ..premium(SubscriptionStatus::Beta)
        });
        let service = SubscriptionService::load(store, "user-1", NOW).await.unwrap();

        let view = service.view(NOW);
        assert_eq!(view.tier, Tier::PremiumBeta);
        assert!(view.is_premium);
        assert_eq!(view.beta_days_left, 2);
        assert_eq!(view.trial_days_left, 0);
        assert!(view.is_beta_tester);
        assert!(!view.has_billing_account);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_internal_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes.store(true, Ordering::SeqCst);

        let err = match SubscriptionService::load(store, "user-1", NOW).await {
            Err(e) => e,
            Ok(_) => panic!("load should fail when the default row cannot be written"),
        };
        assert_eq!(error_code(err), ErrorCode::InternalError);
    }
}
