use academyerp_auth::Role;
use academyerp_core::Email;

/// Principal context for a request (authenticated identity + roles).
///
/// Built from verified token claims only; nothing here is re-read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    email: Email,
    roles: Vec<Role>,
    jti: String,
}

impl PrincipalContext {
    pub fn new(email: Email, roles: Vec<Role>, jti: impl Into<String>) -> Self {
        Self {
            email,
            roles,
            jti: jti.into(),
        }
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Token identifier, for log correlation.
    pub fn jti(&self) -> &str {
        &self.jti
    }
}
