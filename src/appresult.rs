use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{ChatError, ErrorKind};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.0.downcast_ref::<ChatError>() {
            Some(ChatError::FileNotFound(_)) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" }))).into_response()
            }
            Some(err) if err.kind() == ErrorKind::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": err.to_string() }))).into_response()
            }
            _ => {
                tracing::error!(error = %self.0, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{}\n\n{}", self.0, self.0.backtrace()),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        let response = AppError::from(ChatError::FileNotFound("x".to_owned())).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_other_errors_are_internal() {
        let io = std::io::Error::other("disk on fire");
        let response = AppError::from(ChatError::Io(io)).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
