// web-server/src/error.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use vts_client::{AuthError, ClientError, ErrorClass, VtsError};

/// Failure of a portal request.
///
/// Backend symbols keep their own variant so a view can never report a
/// transport problem as, say, `NotFound`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("backend returned {0}")]
    Backend(VtsError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("session registry unavailable: {0}")]
    Registry(#[from] actix::MailboxError),

    #[error("{0}")]
    BadRequest(String),

    /// Lookup that failed on the portal side, not in the backend
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Backend(_) => "backend",
            ApiError::Client(_) => "client",
            ApiError::Auth(_) => "auth",
            ApiError::Registry(_) | ApiError::Internal(_) => "internal",
            ApiError::BadRequest(_) | ApiError::NotFound(_) => "request",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Backend(error) => match (error, error.class()) {
                (VtsError::NotFound, _) => StatusCode::NOT_FOUND,
                (VtsError::AlreadyExists, _) => StatusCode::CONFLICT,
                (_, ErrorClass::Authorization) => StatusCode::FORBIDDEN,
                (_, ErrorClass::Data) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Client(_) => StatusCode::BAD_GATEWAY,
            ApiError::Auth(error) => match error {
                AuthError::InvalidState(_) | AuthError::UnknownLogin => StatusCode::BAD_REQUEST,
                AuthError::Delegation(_) => StatusCode::FORBIDDEN,
                AuthError::Busy => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Registry(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        // Backend symbols are passed through exactly as the canister spells them
        let error = match self {
            ApiError::Backend(symbol) => symbol.symbol().to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(json!({
            "error": error,
            "kind": self.kind(),
        }))
    }
}

/// Unwrap the backend side of a reply
pub fn backend<T>(reply: Result<T, VtsError>) -> Result<T, ApiError> {
    reply.map_err(ApiError::Backend)
}
