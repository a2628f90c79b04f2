use std::fmt;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};

/// Boundary error for the public API. Everything a handler can fail
/// with is converted into one of these and rendered as structured JSON;
/// nothing is allowed to crash the process.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Auth(String),
    NotFound(String),
    RateLimited,
    Verification(String),
    Replay,
    Internal(anyhow::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "{msg}"),
            ApiError::Auth(msg) => write!(f, "{msg}"),
            ApiError::NotFound(msg) => write!(f, "{msg}"),
            ApiError::RateLimited => {
                write!(f, "Too many verification attempts. Please try again later.")
            }
            ApiError::Verification(msg) => write!(f, "Payment verification failed: {msg}"),
            ApiError::Replay => {
                write!(f, "This transaction signature has already been used.")
            }
            // Technical detail stays in the server logs.
            ApiError::Internal(_) => write!(f, "Internal server error. Please try again later."),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Verification(_) => StatusCode::BAD_REQUEST,
            ApiError::Replay => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        log::error!("Internal error: {:#}", e);
        ApiError::Internal(e)
    }
}
