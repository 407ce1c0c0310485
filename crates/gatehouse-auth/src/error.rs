use thiserror::Error;

/// Failure taxonomy for the auth core. Token and credential variants map to
/// 401, missing admin grants to 403, provider outages to 503; callers never
/// see which specific check failed on the 401 path.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is not parseable")]
    MalformedToken,

    #[error("token signature or algorithm rejected")]
    InvalidToken,

    #[error("token past expiry")]
    ExpiredToken,

    #[error("session revoked or unknown")]
    SessionRevoked,

    #[error("no such user")]
    UserNotFound,

    #[error("credential mismatch")]
    CredentialMismatch,

    #[error("no active admin grant")]
    AdminGrantMissing,

    #[error("upstream identity provider unavailable")]
    ProviderUnavailable,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
