//! Billing service configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Billing service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Stripe API base URL (overridable for stripe-mock)
    pub stripe_api_base: String,
    /// Stripe Price ID for the monthly premium plan
    pub stripe_monthly_price_id: String,
    /// Stripe Price ID for the yearly premium plan
    pub stripe_yearly_price_id: String,
    /// HS256 secret of the hosted auth service's session JWTs
    pub jwt_secret: String,
    /// Public web app URL; checkout and portal redirects land here
    pub app_base_url: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            stripe_api_base: std::env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".into()),
            stripe_monthly_price_id: std::env::var("STRIPE_MONTHLY_PRICE_ID")
                .unwrap_or_else(|_| "price_mindplan_premium_monthly".into()),
            stripe_yearly_price_id: std::env::var("STRIPE_YEARLY_PRICE_ID")
                .unwrap_or_else(|_| "price_mindplan_premium_yearly".into()),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            app_base_url: std::env::var("APP_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://mindplan.app".into()),
            environment,
        })
    }

    pub fn checkout_success_url(&self) -> String {
        format!("{}/settings/billing?checkout=success", self.app_base_url)
    }

    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/settings/billing?checkout=cancel", self.app_base_url)
    }

    pub fn portal_return_url(&self) -> String {
        format!("{}/settings/billing", self.app_base_url)
    }
}
