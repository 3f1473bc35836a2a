use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use academyerp_auth::{AccountError, Credentials, FieldError, IssuedToken};

use crate::context::PrincipalContext;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /account/create` and `POST /account/login`.
#[derive(Deserialize, Validate)]
pub struct CredentialsRequest {
    #[serde(default, alias = "Email")]
    #[validate(
        required(message = "The Email field is required."),
        email(message = "The Email field is not a valid e-mail address.")
    )]
    pub email: Option<String>,

    #[serde(default, alias = "Password")]
    #[validate(
        required(message = "The Password field is required."),
        length(min = 1, message = "The Password field is required.")
    )]
    pub password: Option<String>,
}

impl CredentialsRequest {
    /// Shape validation, then normalization into domain credentials.
    pub fn into_credentials(mut self) -> Result<Credentials, AccountError> {
        self.email = self.email.map(|email| email.trim().to_string());
        self.password = self.password.filter(|password| !password.trim().is_empty());

        if let Err(errors) = self.validate() {
            return Err(AccountError::MalformedRequest(field_errors(&errors)));
        }

        Credentials::parse(
            self.email.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
        )
    }
}

fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_deref()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("The {field} field is invalid."));
                FieldError::new(field.to_string(), message)
            })
        })
        .collect();

    out.sort_by(|a, b| a.field.cmp(&b.field));
    out.dedup();
    out
}

// -------------------------
// Response DTOs
// -------------------------

/// Successful activation/login payload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expiration: DateTime<Utc>,
    pub user_name: String,
    pub is_admin_user: bool,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            expiration: issued.expires_at,
            user_name: issued.user_name,
            is_admin_user: issued.is_admin_user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub email: String,
    pub roles: Vec<String>,
    pub jti: String,
}

impl From<&PrincipalContext> for WhoAmIResponse {
    fn from(principal: &PrincipalContext) -> Self {
        Self {
            email: principal.email().to_string(),
            roles: principal.roles().iter().map(|r| r.as_str().to_string()).collect(),
            jti: principal.jti().to_string(),
        }
    }
}
