use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;

use gatehouse_types::api::{OtpRequestBody, OtpVerifyBody};
use gatehouse_types::models::Provider;

use crate::auth::{issue_session, AppState};
use crate::error::ApiError;

pub async fn request_otp(
    State(state): State<AppState>,
    Json(req): Json<OtpRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.otp.request(req.channel, &req.destination).await?;
    Ok(Json(serde_json::json!({ "sent": true })))
}

/// A correct code is a full login: the challenge is consumed and a session
/// token is issued, same as the password path.
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<OtpVerifyBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.otp.verify(req.channel, &req.destination, &req.code)?;
    let role = state.reconciler.role_for_user(&user);

    let (jar, body) = issue_session(
        &state,
        jar,
        user.id,
        user.email.clone(),
        user.name.clone(),
        role,
        Provider::Otp,
    )?;
    Ok((jar, Json(body)))
}
