use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Role;

/// Claim set carried by an access token (wire shape).
///
/// Field names follow the registered/short claim names that downstream
/// consumers (gateways, other services) expect: `unique_name` for the subject
/// email and `role` for authorization roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject email.
    pub unique_name: String,

    /// Fresh identifier per issuance (log correlation only).
    pub jti: String,

    /// Roles snapshotted at issuance time.
    #[serde(default, skip_serializing_if = "RoleClaims::is_empty")]
    pub role: RoleClaims,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration, seconds since the Unix epoch.
    pub exp: i64,

    pub iss: String,
    pub aud: String,
}

impl TokenClaims {
    pub fn roles(&self) -> &[Role] {
        &self.role.0
    }
}

/// Repeated `role` claim.
///
/// Encoded the way JWT handlers encode a repeated claim: a single role is a
/// plain string, several roles are an array with one entry per role. Decoding
/// accepts either form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleClaims(pub Vec<Role>);

impl RoleClaims {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Role>> for RoleClaims {
    fn from(value: Vec<Role>) -> Self {
        Self(value)
    }
}

impl Serialize for RoleClaims {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => serializer.serialize_str(single.as_str()),
            many => many.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RoleClaims {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(role) => Self(vec![Role::new(role)]),
            OneOrMany::Many(roles) => Self(roles.into_iter().map(Role::new).collect()),
        })
    }
}
