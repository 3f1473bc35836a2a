use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use academyerp_auth::{AccountError, FieldError};

pub fn account_error_to_response(err: AccountError) -> axum::response::Response {
    match err {
        AccountError::NotRegistered => {
            json_error(StatusCode::BAD_REQUEST, "not_registered", err.to_string())
        }
        AccountError::AlreadyActivated => {
            json_error(StatusCode::BAD_REQUEST, "already_registered", err.to_string())
        }
        AccountError::InvalidCredentials => {
            json_error(StatusCode::BAD_REQUEST, "invalid_login", err.to_string())
        }
        AccountError::MalformedRequest(errors) => validation_error(errors),
        AccountError::Store(_) | AccountError::Hashing(_) | AccountError::Token(_) => {
            tracing::error!(error = %err, source = ?std::error::Error::source(&err), "request failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An unexpected error occurred.",
            )
        }
    }
}

/// Unparseable bodies are reported like any other invalid request.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    tracing::info!(status = %rejection.status(), "request body rejected");
    validation_error(vec![FieldError::new(
        "",
        "A non-empty request body with valid JSON is required.",
    )])
}

fn validation_error(errors: Vec<FieldError>) -> axum::response::Response {
    error_body(
        StatusCode::BAD_REQUEST,
        "validation_error",
        "One or more validation errors occurred.",
        errors,
    )
}

/// Error with a single model-level entry (empty field name).
pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    let message = message.into();
    let errors = vec![FieldError::new("", message.clone())];
    error_body(status, code, message, errors)
}

fn error_body(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    errors: Vec<FieldError>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "errors": errors,
        })),
    )
        .into_response()
}
