//! Service-layer error type for mindplan-cloud
//!
//! `ServiceError` carries store and infrastructure failures up to the API
//! layer, where they become an `InternalError` response.

use shared::error::{AppError, ErrorCode};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Store or infrastructure failure (auto-logged, mapped to InternalError)
#[derive(Debug)]
pub struct ServiceError(BoxError);

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(ServiceError(e): ServiceError) -> Self {
        tracing::error!(error = %e, "Service storage error");
        AppError::new(ErrorCode::InternalError)
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
