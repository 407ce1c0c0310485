use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use gatehouse_auth::AuthError;
use gatehouse_types::models::{Role, SessionClaims};

use crate::auth::{AppState, SESSION_COOKIE};
use crate::error::ApiError;

/// Pull the session token off a request: cookie first, then bearer header.
pub fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

/// Resolve a request to verified claims, or nothing. Two checks, both
/// required for every provider: the signature/expiry check (stateless) and
/// the live-session check (revocable). Soft-auth callers treat `None` as
/// "no user"; the hard gate turns it into 401.
pub fn authenticate(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Option<(SessionClaims, String)> {
    let token = extract_token(jar, headers)?;
    let claims = match state.codec.verify(&token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("token rejected: {e}");
            return None;
        }
    };
    if !state.sessions.is_active(&token) {
        debug!(sub = claims.sub, "token valid but session not live");
        return None;
    }
    Some((claims, token))
}

/// Hard-auth gate. Inserts [`SessionClaims`] into request extensions on
/// success; rejects with a generic 401 otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (claims, _) = authenticate(&state, &jar, req.headers())
        .ok_or(ApiError(AuthError::SessionRevoked))?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Admin double-check, layered inside `require_auth`: the token must carry
/// `role=admin` AND the claims email must have a live allowlist row. The
/// lookup runs per request, uncached, so pulling a grant takes effect on
/// the very next call.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<SessionClaims>()
        .ok_or(ApiError(AuthError::AdminGrantMissing))?;

    if claims.role != Role::Admin {
        return Err(ApiError(AuthError::AdminGrantMissing));
    }
    let email = claims
        .email
        .as_deref()
        .ok_or(ApiError(AuthError::AdminGrantMissing))?;

    // Fail closed: a grant lookup we cannot complete is a missing grant.
    let granted = state.db.admin_grant_active(email).unwrap_or_else(|e| {
        warn!("admin grant lookup failed, treating as missing: {e}");
        false
    });
    if !granted {
        return Err(ApiError(AuthError::AdminGrantMissing));
    }

    Ok(next.run(req).await)
}
