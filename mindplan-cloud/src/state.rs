//! Application state for mindplan-cloud

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::store::{PgSubscriptionStore, SubscriptionStore};
use crate::stripe::StripeClient;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Subscription persistence
    pub store: Arc<dyn SubscriptionStore>,
    /// Stripe REST client
    pub stripe: StripeClient,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// HS256 secret for session JWT verification
    pub jwt_secret: String,
    /// Redirect after a completed checkout
    pub checkout_success_url: String,
    /// Redirect after an abandoned checkout
    pub checkout_cancel_url: String,
    /// Where the billing portal sends the user back to
    pub portal_return_url: String,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self::with_store(
            config,
            Arc::new(PgSubscriptionStore::new(pool)),
        ))
    }

    /// Build state around an existing store
    pub fn with_store(config: &Config, store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            stripe: StripeClient::new(
                &config.stripe_secret_key,
                &config.stripe_api_base,
                &config.stripe_monthly_price_id,
                &config.stripe_yearly_price_id,
            ),
            stripe_webhook_secret: config.stripe_webhook_secret.clone(),
            jwt_secret: config.jwt_secret.clone(),
            checkout_success_url: config.checkout_success_url(),
            checkout_cancel_url: config.checkout_cancel_url(),
            portal_return_url: config.portal_return_url(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    pub const WEBHOOK_SECRET: &str = "whsec_test";

    pub fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/mindplan_test".into(),
            http_port: 0,
            environment: "development".into(),
            stripe_secret_key: "sk_test_123".into(),
            stripe_webhook_secret: WEBHOOK_SECRET.into(),
            // Nothing listens here; outbound calls fail fast
            stripe_api_base: "http://127.0.0.1:9".into(),
            stripe_monthly_price_id: "price_monthly".into(),
            stripe_yearly_price_id: "price_yearly".into(),
            jwt_secret: crate::auth::user_auth::tests::SECRET.into(),
            app_base_url: "https://app.test".into(),
        }
    }

    pub fn test_state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_store(&test_config(), store.clone());
        (state, store)
    }

    #[test]
    fn redirect_urls_derive_from_app_base() {
        let (state, _) = test_state();
        assert_eq!(
            state.checkout_success_url,
            "https://app.test/settings/billing?checkout=success"
        );
        assert_eq!(state.portal_return_url, "https://app.test/settings/billing");
    }
}
