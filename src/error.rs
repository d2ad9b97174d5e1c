use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Every failure a handler can report to a client.
///
/// Each variant carries the client-facing message and maps to one HTTP status.
/// The JSON body is always the error envelope:
///
/// ```json
/// {"statusCode": 409, "message": "...", "success": false, "errors": []}
/// ```
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or blank required input. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Username or email already taken. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Unknown user. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Bad credentials or a missing, invalid, expired or superseded token. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// A required media upload did not produce a URL. HTTP 400.
    #[error("{0}")]
    Upload(String),

    /// Unexpected failure. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    status_code: u16,
    message: String,
    success: bool,
    errors: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorEnvelope {
            status_code: status.as_u16(),
            message: self.to_string(),
            success: false,
            errors: Vec::new(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_code_mapping() {
        assert_eq!(ApiError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Upload("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn display_is_just_the_message() {
        assert_eq!(ApiError::Conflict("dup".into()).to_string(), "dup");
        assert_eq!(ApiError::Unauthorized("nope".into()).to_string(), "nope");
    }

    #[tokio::test]
    async fn renders_error_envelope() {
        let resp = ApiError::Conflict("User with email or username already exists".into())
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["statusCode"], 409);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "User with email or username already exists");
        assert_eq!(json["errors"], serde_json::json!([]));
    }
}
