use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    /// No valid session cookie on a route that requires one.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Registration attempted with an email that already has an account.
    #[error("An account with this email already exists")]
    DuplicateAccount,

    /// Unknown email or wrong password. Never tells the caller which.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Upload error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Auth failures are recovered into a redirect back to the form the
        // browser came from; the target page shows a user-facing message.
        match &self {
            AppError::Unauthenticated => return Redirect::to("/login").into_response(),
            AppError::InvalidCredentials => {
                return Redirect::to("/login?failed=1").into_response()
            }
            AppError::DuplicateAccount => {
                return Redirect::to("/signup?exists=1").into_response()
            }
            _ => {}
        }

        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Multipart(e) => {
                tracing::error!("Multipart error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid upload".to_string())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Hash(e) => {
                tracing::error!("Password hash error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Unauthenticated
            | AppError::InvalidCredentials
            | AppError::DuplicateAccount => unreachable!(),
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
