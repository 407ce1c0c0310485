use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use gatehouse_auth::reconcile::fold_email;
use gatehouse_types::api::{GrantRequest, GrantView};
use gatehouse_types::models::Principal;

use crate::auth::{principal_from_row, AppState};
use crate::error::ApiError;

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<Principal>>, ApiError> {
    let users = state.db.list_users()?;
    Ok(Json(users.into_iter().map(principal_from_row).collect()))
}

pub async fn list_grants(
    State(state): State<AppState>,
) -> Result<Json<Vec<GrantView>>, ApiError> {
    let grants = state.db.list_admin_grants()?;
    Ok(Json(
        grants
            .into_iter()
            .map(|g| GrantView {
                email: g.email,
                active: g.active,
                created_at: g.created_at,
            })
            .collect(),
    ))
}

pub async fn create_grant(
    State(state): State<AppState>,
    Json(req): Json<GrantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = fold_email(&req.email);
    state.db.upsert_admin_grant(&email)?;
    tracing::info!(email, "admin grant activated");
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "ok": true }))))
}

/// Deactivates the grant; the row stays for audit. Takes effect on the
/// holder's next request since the gate never caches grant lookups.
pub async fn delete_grant(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.db.deactivate_admin_grant(&fold_email(&email))?;
    if removed {
        tracing::info!(email, "admin grant deactivated");
    }
    Ok(Json(serde_json::json!({ "removed": removed })))
}
