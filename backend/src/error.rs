//! HTTP-boundary error type.
//!
//! Messages are fixed per variant; store detail is logged here and replaced
//! with a generic message before it reaches the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use warden_common::{ErrorResponse, Role};

use crate::auth::{Denial, GateError};
use crate::store::StoreError;
use crate::users::UserError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    /// Gate refusal; carries the fixed message for the threshold
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("User not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("Internal server error")]
    Internal(String),
}

fn forbidden_message(required: Role) -> &'static str {
    match required {
        Role::SuperAdmin => "Super admin access required",
        Role::Admin => "Admin access required",
        Role::User => "Access denied",
    }
}

impl ApiError {
    /// Map a gate refusal at `required` to its HTTP form.
    pub fn denied(denial: Denial, required: Role) -> Self {
        match denial {
            Denial::NotAuthenticated => ApiError::Unauthorized,
            Denial::RecordNotReady | Denial::InsufficientPrivilege => {
                ApiError::Forbidden(forbidden_message(required))
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound(_) => ApiError::NotFound,
            UserError::Store(e) => e.into(),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(e: GateError) -> Self {
        match e {
            // Mutations are only exposed at the super admin threshold
            GateError::Denied(denial) => ApiError::denied(denial, Role::SuperAdmin),
            GateError::NotFound(_) => ApiError::NotFound,
            GateError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("Internal error: {}", detail);
        }

        let status = self.status();
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
