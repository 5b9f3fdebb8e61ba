use rocket::serde::json::Json;
use thiserror::Error;

use super::ai::AiError;
use crate::{ApiError, ErrorDetail};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    InternalError(String),
}

impl From<diesel::result::Error> for ServiceError {
    fn from(err: diesel::result::Error) -> Self {
        ServiceError::InternalError(format!("database error: {err}"))
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ServiceError::InternalError(format!("failed to get DB connection: {err}"))
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ServiceError::InternalError(format!("password hashing failed: {err}"))
    }
}

impl From<jsonwebtoken::errors::Error> for ServiceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ServiceError::InternalError(format!("token encoding failed: {err}"))
    }
}

impl From<AiError> for ServiceError {
    fn from(err: AiError) -> Self {
        ServiceError::BadRequest(format!("description enrichment failed: {err}"))
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(detail) => ApiError::NotFound(Json(ErrorDetail { detail })),
            ServiceError::Unauthorized(detail) => ApiError::Unauthorized(Json(ErrorDetail { detail })),
            ServiceError::BadRequest(detail) => ApiError::BadRequest(Json(ErrorDetail { detail })),
            ServiceError::InternalError(detail) => {
                tracing::error!(%detail, "internal error while handling request");
                ApiError::InternalError(Json(ErrorDetail {
                    detail: "Internal server error".to_string(),
                }))
            }
        }
    }
}
