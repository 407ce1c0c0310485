use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use gatehouse_auth::external::ExternalVerifier;
use gatehouse_auth::otp::OtpService;
use gatehouse_auth::reconcile::{fold_email, IdentityReconciler};
use gatehouse_auth::session::SessionStore;
use gatehouse_auth::token::TokenCodec;
use gatehouse_auth::{password, AuthError};
use gatehouse_db::models::UserRow;
use gatehouse_db::Database;
use gatehouse_types::api::{LoginRequest, MeResponse, RegisterRequest, TokenResponse};
use gatehouse_types::models::{Principal, Provider, Role, VerifiedIdentity};

use crate::error::ApiError;
use crate::middleware::authenticate;

pub const SESSION_COOKIE: &str = "gatehouse_session";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub codec: TokenCodec,
    pub sessions: SessionStore,
    pub reconciler: IdentityReconciler,
    pub otp: OtpService,
    pub google: Option<ExternalVerifier>,
    pub hosted: Option<ExternalVerifier>,
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if !req.email.contains('@') || req.email.len() > 254 || req.password.len() < 8 {
        return Ok(reject(StatusCode::BAD_REQUEST, "invalid request"));
    }

    let email = fold_email(&req.email);
    if state.db.get_user_by_email(&email)?.is_some() {
        return Ok(reject(StatusCode::CONFLICT, "email already registered"));
    }

    let hash = password::hash_password(&req.password)?;
    // Not verified yet: registration alone proves nothing about the address.
    let user_id = state.db.create_user(
        Some(&email),
        req.name.as_deref(),
        None,
        Some(&hash),
        false,
    )?;
    let user = state
        .db
        .get_user_by_id(user_id)?
        .ok_or(AuthError::UserNotFound)?;
    let role = state.reconciler.role_for_user(&user);

    let (jar, body) = issue_session(
        &state,
        jar,
        user_id,
        Some(email),
        req.name,
        role,
        Provider::Password,
    )?;
    Ok((StatusCode::CREATED, jar, Json(body)).into_response())
}

fn reject(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = fold_email(&req.email);
    let user = state
        .db
        .get_user_by_email(&email)?
        .ok_or(AuthError::CredentialMismatch)?;
    let stored = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::CredentialMismatch)?;
    password::verify_password(&req.password, stored)?;

    // Password checked; from here the flow is identical to every other
    // provider adapter.
    let (user_id, role) = state.reconciler.resolve_or_create(&VerifiedIdentity {
        email: email.clone(),
        name: None,
        provider_role: None,
    })?;

    let (jar, body) = issue_session(
        &state,
        jar,
        user_id,
        Some(email),
        user.name,
        role,
        Provider::Password,
    )?;
    Ok((jar, Json(body)))
}

/// Soft posture: absent or bad credentials answer `user: null`, never 401.
/// Public pages probe login state through here without surfacing errors.
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    let user = match authenticate(&state, &jar, &headers) {
        Some((claims, _)) => state.db.get_user_by_id(claims.sub)?.map(principal_from_row),
        None => None,
    };
    Ok(Json(MeResponse { user }))
}

/// Revokes the presented session and clears the cookie. Always succeeds,
/// even with no or an unknown token; logout is not a place to fail.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = crate::middleware::extract_token(&jar, &headers) {
        if let Err(e) = state.sessions.revoke(&token) {
            tracing::warn!("session revoke on logout failed: {e}");
        }
    }
    // Removal cookie must carry the same path the login cookie was set with.
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok((jar, Json(serde_json::json!({ "ok": true }))))
}

/// Shared tail of every login-like flow: sign claims, record the session,
/// set the httpOnly cookie.
pub(crate) fn issue_session(
    state: &AppStateInner,
    jar: CookieJar,
    user_id: i64,
    email: Option<String>,
    name: Option<String>,
    role: Role,
    provider: Provider,
) -> Result<(CookieJar, TokenResponse), ApiError> {
    let (token, claims) = state.codec.issue(user_id, email, name, role, provider)?;
    state.sessions.create(user_id, &token, claims.exp)?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    Ok((jar.add(cookie), TokenResponse { token, role }))
}

pub(crate) fn principal_from_row(row: UserRow) -> Principal {
    let role = match row.role.as_str() {
        "admin" => Role::Admin,
        _ => Role::User,
    };
    Principal {
        id: row.id,
        email: row.email,
        name: row.name,
        role,
        verified: row.verified,
    }
}
