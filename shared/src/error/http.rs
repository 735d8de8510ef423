//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 409 Conflict
            Self::AlreadyPremium => StatusCode::CONFLICT,

            // 400 Bad Request
            Self::InvalidPrice | Self::NoBillingAccount => StatusCode::BAD_REQUEST,

            // 502 Bad Gateway (payment provider failed us)
            Self::PaymentSetupFailed | Self::PaymentProviderError => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
