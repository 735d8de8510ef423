//! Stripe webhook handler
//!
//! POST /stripe/webhook: mirrors Stripe subscription state into the local
//! subscription record (raw body for signature verification)

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use shared::SubscriptionStatus;

use crate::state::AppState;
use crate::store::{CheckoutCompleted, StatusSync};
use crate::stripe;

/// Handle incoming Stripe webhook events
///
/// Must receive raw body (not JSON) for HMAC signature verification.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    // 1. Get Stripe-Signature header
    let sig_header = match headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    // 2. Verify signature
    if let Err(e) = stripe::verify_webhook_signature(
        &body,
        sig_header,
        &state.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    ) {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    // 3. Parse JSON event
    let event: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    let event_type = event["type"].as_str().unwrap_or("");
    let event_id = match event["id"].as_str() {
        Some(id) => id,
        None => {
            tracing::warn!("Webhook event missing id");
            return StatusCode::BAD_REQUEST;
        }
    };
    tracing::info!(event_id, event_type, "Received Stripe webhook");

    // 4. Idempotency: record first, skip if already seen
    let now = shared::util::now_millis();
    match state
        .store
        .record_webhook_event(event_id, event_type, now)
        .await
    {
        Ok(false) => {
            tracing::info!(event_id, "Duplicate webhook event, skipping");
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "Store error recording webhook event");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        Ok(true) => {}
    }

    // 5. Handle event types
    let obj = &event["data"]["object"];
    let status = match event_type {
        "checkout.session.completed" => handle_checkout_completed(&state, obj, now).await,
        "customer.subscription.updated" => handle_subscription_updated(&state, obj, now).await,
        "customer.subscription.deleted" => handle_subscription_deleted(&state, obj, now).await,
        "invoice.payment_succeeded" | "invoice.paid" => {
            handle_invoice_paid(&state, obj, now).await
        }
        "invoice.payment_failed" => handle_payment_failed(&state, obj, now).await,
        _ => {
            tracing::debug!(event_type, "Unhandled webhook event type");
            StatusCode::OK
        }
    };

    // Let Stripe's retry reprocess an event whose handling failed
    if status == StatusCode::INTERNAL_SERVER_ERROR
        && let Err(e) = state.store.forget_webhook_event(event_id).await
    {
        tracing::error!(%e, event_id, "Failed to un-record webhook event");
    }

    status
}

/// checkout.session.completed → premium/active
async fn handle_checkout_completed(state: &AppState, obj: &Value, now: i64) -> StatusCode {
    let user_id = match obj["metadata"]["user_id"]
        .as_str()
        .or_else(|| obj["client_reference_id"].as_str())
        .filter(|s| !s.is_empty())
    {
        Some(s) => s,
        None => {
            tracing::warn!("checkout.session.completed missing user_id");
            return StatusCode::OK;
        }
    };

    let subscription_id = match obj["subscription"].as_str() {
        Some(s) => s,
        None => {
            tracing::warn!(user_id, "checkout.session.completed missing subscription");
            return StatusCode::OK;
        }
    };

    let checkout = CheckoutCompleted {
        user_id,
        stripe_customer_id: obj["customer"].as_str(),
        stripe_subscription_id: subscription_id,
        now,
    };
    if let Err(e) = state.store.upsert_checkout(&checkout).await {
        tracing::error!(%e, user_id, "Failed to activate premium subscription");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    tracing::info!(
        user_id,
        subscription_id,
        "Premium activated via Stripe checkout"
    );
    StatusCode::OK
}

/// customer.subscription.updated → sync status, period end, trial end
async fn handle_subscription_updated(state: &AppState, obj: &Value, now: i64) -> StatusCode {
    let sub_id = match obj["id"].as_str() {
        Some(s) => s,
        None => {
            tracing::warn!("customer.subscription.updated missing id");
            return StatusCode::OK;
        }
    };

    let stripe_status = obj["status"].as_str().unwrap_or("");
    let Some(status) = SubscriptionStatus::from_stripe(stripe_status) else {
        tracing::info!(
            subscription_id = sub_id,
            stripe_status,
            "Ignoring Stripe subscription status with no local counterpart"
        );
        return StatusCode::OK;
    };

    // Newer API versions carry the period on the subscription item
    let current_period_end = obj["current_period_end"]
        .as_i64()
        .or_else(|| obj["items"]["data"][0]["current_period_end"].as_i64())
        .map(secs_to_millis);

    // A local trial is only written with a provider end date
    let trial_end = obj["trial_end"].as_i64().map(secs_to_millis);
    if status == SubscriptionStatus::Trial && trial_end.is_none() {
        tracing::warn!(
            subscription_id = sub_id,
            "Trialing subscription without trial_end, leaving status unchanged"
        );
        return StatusCode::OK;
    }

    let sync = StatusSync {
        stripe_subscription_id: sub_id,
        status,
        current_period_end,
        trial_end,
        now,
    };
    sync_status(state, &sync).await
}

/// customer.subscription.deleted → cancelled
async fn handle_subscription_deleted(state: &AppState, obj: &Value, now: i64) -> StatusCode {
    let sub_id = match obj["id"].as_str() {
        Some(s) => s,
        None => {
            tracing::warn!("customer.subscription.deleted missing id");
            return StatusCode::OK;
        }
    };

    let sync = StatusSync {
        stripe_subscription_id: sub_id,
        status: SubscriptionStatus::Cancelled,
        current_period_end: None,
        trial_end: None,
        now,
    };
    sync_status(state, &sync).await
}

/// invoice.payment_succeeded / invoice.paid → active, period end from first line
async fn handle_invoice_paid(state: &AppState, obj: &Value, now: i64) -> StatusCode {
    let Some(sub_id) = invoice_subscription(obj) else {
        tracing::warn!("Paid invoice missing subscription");
        return StatusCode::OK;
    };

    let period_end = obj["lines"]["data"][0]["period"]["end"]
        .as_i64()
        .map(secs_to_millis);

    let sync = StatusSync {
        stripe_subscription_id: sub_id,
        status: SubscriptionStatus::Active,
        current_period_end: period_end,
        trial_end: None,
        now,
    };
    sync_status(state, &sync).await
}

/// invoice.payment_failed → past_due
async fn handle_payment_failed(state: &AppState, obj: &Value, now: i64) -> StatusCode {
    let Some(sub_id) = invoice_subscription(obj) else {
        tracing::warn!("invoice.payment_failed missing subscription");
        return StatusCode::OK;
    };

    let sync = StatusSync {
        stripe_subscription_id: sub_id,
        status: SubscriptionStatus::PastDue,
        current_period_end: None,
        trial_end: None,
        now,
    };
    sync_status(state, &sync).await
}

async fn sync_status(state: &AppState, sync: &StatusSync<'_>) -> StatusCode {
    match state.store.sync_status(sync).await {
        Ok(true) => {
            tracing::info!(
                subscription_id = sync.stripe_subscription_id,
                status = sync.status.as_db(),
                "Subscription status synced"
            );
            StatusCode::OK
        }
        Ok(false) => {
            tracing::warn!(
                subscription_id = sync.stripe_subscription_id,
                "No local subscription for Stripe subscription"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(%e, subscription_id = sync.stripe_subscription_id, "Failed to sync subscription status");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Subscription ID of an invoice (top-level field, or under `parent` in newer API versions)
fn invoice_subscription(obj: &Value) -> Option<&str> {
    obj["subscription"]
        .as_str()
        .or_else(|| obj["parent"]["subscription_details"]["subscription"].as_str())
}

/// Stripe timestamps are seconds
fn secs_to_millis(secs: i64) -> i64 {
    secs.saturating_mul(1000)
}
