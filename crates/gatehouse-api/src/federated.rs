use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;

use gatehouse_auth::external::ExternalVerifier;
use gatehouse_auth::reconcile::fold_email;
use gatehouse_auth::AuthError;
use gatehouse_types::api::{GoogleLoginRequest, TokenExchangeRequest};
use gatehouse_types::models::{Provider, VerifiedIdentity};

use crate::auth::{issue_session, AppState};
use crate::error::ApiError;

/// Login with a Google ID token. The token is verified against Google's
/// JWKS before the reconciler ever sees the email.
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<GoogleLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let verifier = configured(&state.google)?;
    let identity = verifier.verify(&req.id_token).await?;
    finish_login(&state, jar, identity).await
}

/// Exchange a token issued by the hosted auth provider for a local session.
/// The hosted provider fronts Google OAuth, so the issued claims carry the
/// google provider tag.
pub async fn exchange_token(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<TokenExchangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let verifier = configured(&state.hosted)?;
    let identity = verifier.verify(&req.token).await?;
    finish_login(&state, jar, identity).await
}

fn configured(verifier: &Option<ExternalVerifier>) -> Result<&ExternalVerifier, ApiError> {
    // An unconfigured upstream is an outage, not a caller mistake.
    verifier.as_ref().ok_or(ApiError(AuthError::ProviderUnavailable))
}

async fn finish_login(
    state: &AppState,
    jar: CookieJar,
    identity: VerifiedIdentity,
) -> Result<axum::response::Response, ApiError> {
    let (user_id, role) = state.reconciler.resolve_or_create(&identity)?;
    // Claims carry the folded email so the admin-grant lookup matches.
    let (jar, body) = issue_session(
        state,
        jar,
        user_id,
        Some(fold_email(&identity.email)),
        identity.name,
        role,
        Provider::Google,
    )?;
    Ok((jar, Json(body)).into_response())
}
