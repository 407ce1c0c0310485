use serde::{Deserialize, Serialize};

/// Which external channel a login arrived through. Embedded in every token
/// so the gate and audit logs can tell logins apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Password,
    Otp,
    Google,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Otp => "otp",
            Self::Google => "google",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

// -- Session claims --

/// JWT claims shared across gatehouse-auth (codec) and gatehouse-api
/// (gate middleware). Canonical definition lives here in gatehouse-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject -- the user's numeric database id.
    pub sub: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    pub provider: Provider,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// The uniform output of every identity-provider adapter. By the time one
/// of these exists the external credential has already been verified; the
/// reconciler trusts it as-is.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub email: String,
    pub name: Option<String>,
    /// Role the external provider declared for this identity, if any.
    pub provider_role: Option<Role>,
}

/// Public view of an authenticated user, returned by /auth/me and the
/// admin user listing. Never exposes password or phone-verification state
/// beyond the single verified flag.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub verified: bool,
}
