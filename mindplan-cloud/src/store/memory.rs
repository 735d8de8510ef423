//! In-memory store mirroring the PostgreSQL semantics (tests only)

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use shared::{PlanType, Subscription, SubscriptionStatus, TimeBox};

use super::{BoxError, CheckoutCompleted, StatusSync, SubscriptionRecord, SubscriptionStore};

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<SubscriptionRecord>>,
    events: Mutex<HashSet<String>>,
    next_id: AtomicI64,
    /// Number of downgrade writes that changed a row
    pub downgrade_writes: AtomicUsize,
    /// When set, every write fails
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SubscriptionRecord) {
        self.rows.lock().unwrap().push(record);
    }

    /// Insert a bare subscription with fresh bookkeeping fields
    pub fn insert_subscription(&self, subscription: Subscription) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.insert(SubscriptionRecord {
            id,
            updated_at: subscription.created_at,
            subscription,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            current_period_end: None,
        });
    }

    /// All records for the user, in insertion order
    pub fn rows(&self, user_id: &str) -> Vec<SubscriptionRecord> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.subscription.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn latest(&self, user_id: &str) -> Option<SubscriptionRecord> {
        let rows = self.rows.lock().unwrap();
        Self::latest_index(&rows, user_id).map(|i| rows[i].clone())
    }

    pub fn row_count(&self, user_id: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.subscription.user_id == user_id)
            .count()
    }

    fn latest_index(rows: &[SubscriptionRecord], user_id: &str) -> Option<usize> {
        rows.iter()
            .enumerate()
            .filter(|(_, r)| r.subscription.user_id == user_id)
            .max_by_key(|(_, r)| (r.subscription.created_at, r.id))
            .map(|(i, _)| i)
    }

    fn check_writable(&self) -> Result<(), BoxError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("memory store: writes disabled".into());
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_latest(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, BoxError> {
        Ok(self.latest(user_id))
    }

    async fn create_default(
        &self,
        user_id: &str,
        now: i64,
    ) -> Result<SubscriptionRecord, BoxError> {
        self.check_writable()?;
        self.insert_subscription(Subscription::new_free(user_id, now));
        self.latest(user_id)
            .ok_or_else(|| "memory store: inserted row missing".into())
    }

    async fn downgrade(&self, id: i64, expired: TimeBox, now: i64) -> Result<bool, BoxError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| {
            r.id == id
                && r.subscription.plan_type == PlanType::Premium
                && r.subscription.status == expired.status()
        }) else {
            return Ok(false);
        };
        row.subscription.apply_downgrade(expired);
        row.updated_at = now;
        self.downgrade_writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn set_customer(
        &self,
        user_id: &str,
        customer_id: &str,
        now: i64,
    ) -> Result<(), BoxError> {
        self.check_writable()?;
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.subscription.user_id == user_id {
                row.stripe_customer_id = Some(customer_id.to_string());
                row.updated_at = now;
            }
        }
        Ok(())
    }

    async fn upsert_checkout(&self, checkout: &CheckoutCompleted<'_>) -> Result<(), BoxError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap();
        match Self::latest_index(&rows, checkout.user_id) {
            Some(i) => {
                let row = &mut rows[i];
                row.subscription.plan_type = PlanType::Premium;
                row.subscription.status = SubscriptionStatus::Active;
                row.subscription.trial_end = None;
                if let Some(cid) = checkout.stripe_customer_id {
                    row.stripe_customer_id = Some(cid.to_string());
                }
                row.stripe_subscription_id = Some(checkout.stripe_subscription_id.to_string());
                row.updated_at = checkout.now;
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                rows.push(SubscriptionRecord {
                    id,
                    subscription: Subscription {
                        plan_type: PlanType::Premium,
                        ..Subscription::new_free(checkout.user_id, checkout.now)
                    },
                            stripe_customer_id: checkout.stripe_customer_id.map(String::from),
                    stripe_subscription_id: Some(checkout.stripe_subscription_id.to_string()),
                    current_period_end: None,
                    updated_at: checkout.now,
                });
            }
        }
        Ok(())
    }

    async fn sync_status(&self, sync: &StatusSync<'_>) -> Result<bool, BoxError> {
        self.check_writable()?;
        let mut matched = false;
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.stripe_subscription_id.as_deref() == Some(sync.stripe_subscription_id) {
                row.subscription.plan_type = PlanType::Premium;
                row.subscription.status = sync.status;
                if let Some(end) = sync.current_period_end {
                    row.current_period_end = Some(end);
                }
                if let Some(end) = sync.trial_end {
                    row.subscription.trial_end = Some(end);
                }
                row.updated_at = sync.now;
                matched = true;
            }
        }
        Ok(matched)
    }

    async fn record_webhook_event(
        &self,
        event_id: &str,
        _event_type: &str,
        _now: i64,
    ) -> Result<bool, BoxError> {
        Ok(self.events.lock().unwrap().insert(event_id.to_string()))
    }

    async fn forget_webhook_event(&self, event_id: &str) -> Result<(), BoxError> {
        self.events.lock().unwrap().remove(event_id);
        Ok(())
    }
}
