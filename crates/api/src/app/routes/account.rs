use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};

use crate::app::dto::{CredentialsRequest, TokenResponse};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/account/create", post(create_account))
        .route("/account/login", post(login))
}

/// First-time password establishment for a provisioned identity.
pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let credentials = match body.into_credentials() {
        Ok(credentials) => credentials,
        Err(e) => return errors::account_error_to_response(e),
    };

    match services.accounts.activate(&credentials).await {
        Ok(issued) => Json(TokenResponse::from(issued)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<CredentialsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let credentials = match body.into_credentials() {
        Ok(credentials) => credentials,
        Err(e) => return errors::account_error_to_response(e),
    };

    match services.accounts.login(&credentials).await {
        Ok(issued) => Json(TokenResponse::from(issued)).into_response(),
        Err(e) => errors::account_error_to_response(e),
    }
}
