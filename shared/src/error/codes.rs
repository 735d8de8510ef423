//! Unified error codes for MindPlan
//!
//! This module defines the error codes returned by the billing service and
//! consumed by the web frontend. Error codes are organized by category:
//! - 1xxx: Authentication errors
//! - 3xxx: Subscription errors
//! - 5xxx: Payment errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 3xxx: Subscription ====================
    /// User already holds a paid premium plan
    AlreadyPremium = 3002,
    /// No billing account (payment-provider customer) on file
    NoBillingAccount = 3004,
    /// Price identifier is not one of the offered plans
    InvalidPrice = 3005,

    // ==================== 5xxx: Payment ====================
    /// Payment setup failed (checkout / customer creation)
    PaymentSetupFailed = 5001,
    /// Payment provider API returned an error
    PaymentProviderError = 5002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Subscription
            ErrorCode::AlreadyPremium => "Already on a premium plan",
            ErrorCode::NoBillingAccount => "No billing account on file",
            ErrorCode::InvalidPrice => "Unknown price identifier",

            // Payment
            ErrorCode::PaymentSetupFailed => "Payment setup failed",
            ErrorCode::PaymentProviderError => "Payment provider error",

            // System
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Subscription
            3002 => Ok(ErrorCode::AlreadyPremium),
            3004 => Ok(ErrorCode::NoBillingAccount),
            3005 => Ok(ErrorCode::InvalidPrice),

            // Payment
            5001 => Ok(ErrorCode::PaymentSetupFailed),
            5002 => Ok(ErrorCode::PaymentProviderError),

            // System
            9001 => Ok(ErrorCode::InternalError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
