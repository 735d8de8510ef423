//! Stripe integration via REST API (no SDK dependency)

use hmac::{Hmac, Mac};
use sha2::Sha256;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maximum accepted age of a webhook signature timestamp (seconds)
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Billing interval offered at checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanInterval {
    Monthly,
    Yearly,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// Stripe REST client with the configured premium price IDs
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
    pub monthly_price_id: String,
    pub yearly_price_id: String,
}

impl StripeClient {
    pub fn new(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        monthly_price_id: impl Into<String>,
        yearly_price_id: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            monthly_price_id: monthly_price_id.into(),
            yearly_price_id: yearly_price_id.into(),
        }
    }

    /// Which premium plan a price ID belongs to, if any
    pub fn plan_for_price(&self, price_id: &str) -> Option<PlanInterval> {
        if price_id == self.monthly_price_id {
            Some(PlanInterval::Monthly)
        } else if price_id == self.yearly_price_id {
            Some(PlanInterval::Yearly)
        } else {
            None
        }
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<serde_json::Value, BoxError> {
        let resp: serde_json::Value = self
            .http
            .post(format!("{}{path}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await?
            .json()
            .await?;
        Ok(resp)
    }

    /// Create a Stripe Customer tagged with the MindPlan user ID
    pub async fn create_customer(
        &self,
        email: Option<&str>,
        user_id: &str,
    ) -> Result<String, BoxError> {
        let mut form = vec![("metadata[user_id]", user_id)];
        if let Some(email) = email {
            form.push(("email", email));
        }
        let resp = self.post_form("/v1/customers", &form).await?;

        resp["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("Stripe create_customer failed: {resp}").into())
    }

    /// Create a Stripe Checkout Session (subscription mode)
    ///
    /// The user ID travels both as `client_reference_id` and in session
    /// metadata so `checkout.session.completed` can be mapped back.
    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        user_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, BoxError> {
        let resp = self
            .post_form(
                "/v1/checkout/sessions",
                &[
                    ("customer", customer_id),
                    ("mode", "subscription"),
                    ("line_items[0][price]", price_id),
                    ("line_items[0][quantity]", "1"),
                    ("success_url", success_url),
                    ("cancel_url", cancel_url),
                    ("allow_promotion_codes", "true"),
                    ("client_reference_id", user_id),
                    ("metadata[user_id]", user_id),
                    ("subscription_data[metadata][user_id]", user_id),
                ],
            )
            .await?;

        resp["url"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("Stripe create_checkout failed: {resp}").into())
    }

    /// Create a Stripe Billing Portal session
    pub async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BoxError> {
        let resp = self
            .post_form(
                "/v1/billing_portal/sessions",
                &[("customer", customer_id), ("return_url", return_url)],
            )
            .await?;

        resp["url"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| format!("Stripe billing portal failed: {resp}").into())
    }
}

/// Verify Stripe webhook signature (HMAC-SHA256)
///
/// Header format: `t=<unix secs>,v1=<hex>[,v1=<hex>...]`. Any `v1` entry may
/// match; Stripe sends several while a signing secret is being rolled.
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now_secs - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("Webhook timestamp outside tolerance");
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Constant-time comparison via hmac::verify_slice
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err("Webhook signature mismatch")
    }
}

/// Build a `Stripe-Signature` header value for `payload` (test helper)
#[cfg(test)]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}
