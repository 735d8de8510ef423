//! Subscription model and entitlement resolution
//!
//! A user's entitlement is a pure function of their subscription record and
//! the current time. [`resolve`] never performs I/O: when a time-boxed tier
//! (trial or beta) has run out it reports the expiry in
//! [`Resolution::expired`] and leaves the downgrade write to the caller.
//!
//! All timestamps are Unix epoch milliseconds.

use serde::{Deserialize, Serialize};

use crate::util::DAY_MILLIS;

/// Length of the default trial window, applied when a trial record has no
/// explicit `trial_end`.
pub const TRIAL_DAYS: i64 = 7;

/// Billing plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Free,
    Premium,
}

impl PlanType {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Self::Free),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and current (or the default state of a free plan)
    Active,
    /// Time-boxed trial, bounded by `trial_end`
    Trial,
    /// Beta-tester access, optionally bounded by `beta_end`
    Beta,
    /// Latest invoice failed, still inside the provider's retry window
    PastDue,
    /// Provider gave up retrying the invoice
    Unpaid,
    /// Subscription ended at the provider
    Cancelled,
}

impl SubscriptionStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "trial" => Some(Self::Trial),
            "beta" => Some(Self::Beta),
            "past_due" => Some(Self::PastDue),
            "unpaid" => Some(Self::Unpaid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::Beta => "beta",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Cancelled => "cancelled",
        }
    }

    /// Map a Stripe subscription status onto the local status set.
    ///
    /// Returns `None` for provider states with no local counterpart
    /// (`incomplete`, `incomplete_expired`, `paused`); callers leave the
    /// record untouched in that case.
    pub fn from_stripe(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "trialing" => Some(Self::Trial),
            "past_due" => Some(Self::PastDue),
            "unpaid" => Some(Self::Unpaid),
            "canceled" | "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A user's subscription record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: String,
    pub plan_type: PlanType,
    pub status: SubscriptionStatus,
    pub trial_end: Option<i64>,
    pub beta_end: Option<i64>,
    pub is_beta_tester: bool,
    pub created_at: i64,
}

impl Subscription {
    /// Default record for a user seen for the first time: `free/active`
    pub fn new_free(user_id: impl Into<String>, now: i64) -> Self {
        Self {
            user_id: user_id.into(),
            plan_type: PlanType::Free,
            status: SubscriptionStatus::Active,
            trial_end: None,
            beta_end: None,
            is_beta_tester: false,
            created_at: now,
        }
    }

    /// End of the trial window: the stored `trial_end`, or `created_at`
    /// plus [`TRIAL_DAYS`] for trial records without one.
    ///
    /// `None` means no end can be determined; callers treat that as expired.
    pub fn effective_trial_end(&self) -> Option<i64> {
        match self.trial_end {
            Some(end) => Some(end),
            None if self.status == SubscriptionStatus::Trial => self
                .created_at
                .checked_add(TRIAL_DAYS.checked_mul(DAY_MILLIS)?),
            None => None,
        }
    }

    /// Apply the downgrade for an expired time box in place.
    pub fn apply_downgrade(&mut self, expired: TimeBox) {
        self.plan_type = PlanType::Free;
        self.status = SubscriptionStatus::Active;
        match expired {
            TimeBox::Trial => self.trial_end = None,
            TimeBox::Beta => {
                self.beta_end = None;
                self.is_beta_tester = false;
            }
        }
    }
}

/// Time-boxed premium tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBox {
    Trial,
    Beta,
}

impl TimeBox {
    /// Status a record must hold for this time box to apply
    pub fn status(&self) -> SubscriptionStatus {
        match self {
            Self::Trial => SubscriptionStatus::Trial,
            Self::Beta => SubscriptionStatus::Beta,
        }
    }
}

/// Entitlement tier derived from a subscription record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    PremiumActive,
    PremiumTrial,
    PremiumBeta,
    /// `past_due` / `unpaid`: premium kept during the grace period
    PremiumPaymentIssue,
}

impl Tier {
    pub fn is_premium(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// Result of resolving a subscription at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub tier: Tier,
    /// Set when a time-boxed tier has run out; the record must be downgraded.
    pub expired: Option<TimeBox>,
}

impl Resolution {
    fn tier(tier: Tier) -> Self {
        Self {
            tier,
            expired: None,
        }
    }

    fn expired(time_box: TimeBox) -> Self {
        Self {
            tier: Tier::Free,
            expired: Some(time_box),
        }
    }

    pub fn is_premium(&self) -> bool {
        self.tier.is_premium()
    }
}

/// Resolve the entitlement tier of `subscription` at `now`.
pub fn resolve(subscription: Option<&Subscription>, now: i64) -> Resolution {
    let Some(sub) = subscription else {
        return Resolution::tier(Tier::Free);
    };

    match (sub.plan_type, sub.status) {
        (PlanType::Free, _) => Resolution::tier(Tier::Free),
        (PlanType::Premium, SubscriptionStatus::Active) => Resolution::tier(Tier::PremiumActive),
        (PlanType::Premium, SubscriptionStatus::Beta) => match sub.beta_end {
            Some(end) if now > end => Resolution::expired(TimeBox::Beta),
            _ => Resolution::tier(Tier::PremiumBeta),
        },
        (PlanType::Premium, SubscriptionStatus::Trial) => match sub.effective_trial_end() {
            Some(end) if now <= end => Resolution::tier(Tier::PremiumTrial),
            _ => Resolution::expired(TimeBox::Trial),
        },
        (PlanType::Premium, SubscriptionStatus::PastDue | SubscriptionStatus::Unpaid) => {
            Resolution::tier(Tier::PremiumPaymentIssue)
        }
        (PlanType::Premium, SubscriptionStatus::Cancelled) => Resolution::tier(Tier::Free),
    }
}

/// Whether `subscription` grants premium entitlement at `now`.
pub fn is_premium(subscription: Option<&Subscription>, now: i64) -> bool {
    resolve(subscription, now).is_premium()
}

/// Whole days remaining in a time box, rounded up and never negative.
///
/// Beta without a `beta_end` has no countdown and reports 0.
pub fn days_left(subscription: Option<&Subscription>, now: i64, time_box: TimeBox) -> i64 {
    let Some(sub) = subscription else {
        return 0;
    };
    let end = match time_box {
        TimeBox::Trial => sub.effective_trial_end(),
        TimeBox::Beta => sub.beta_end,
    };
    match end.and_then(|end| end.checked_sub(now)) {
        Some(remaining) if remaining > 0 => {
            remaining / DAY_MILLIS + i64::from(remaining % DAY_MILLIS != 0)
        }
        _ => 0,
    }
}
