use serde::{Deserialize, Serialize};

use crate::models::{Principal, Role};

// -- Password auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Every login-like endpoint answers with this; the same response also
/// sets the httpOnly session cookie.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub role: Role,
}

// -- OTP --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpChannel {
    Email,
    Sms,
}

impl OtpChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtpRequestBody {
    /// Email address or phone number, matching the channel.
    pub destination: String,
    pub channel: OtpChannel,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtpVerifyBody {
    pub destination: String,
    pub channel: OtpChannel,
    pub code: String,
}

// -- Federated auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

/// Exchange a token issued by the hosted auth provider for a local session.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenExchangeRequest {
    pub token: String,
}

// -- Session introspection --

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: Option<Principal>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct GrantView {
    pub email: String,
    pub active: bool,
    pub created_at: String,
}
