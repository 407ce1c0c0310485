pub mod admin;
pub mod auth;
pub mod error;
pub mod federated;
pub mod middleware;
pub mod otp;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};

use crate::auth::AppState;
use crate::middleware::{require_admin, require_auth};

/// Assemble the full route table. Public routes carry no gate; admin routes
/// run the hard-auth gate first, then the admin double-check.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/otp/request", post(otp::request_otp))
        .route("/auth/otp/verify", post(otp::verify_otp))
        .route("/auth/google", post(federated::google_login))
        .route("/auth/exchange", post(federated::exchange_token))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let admin = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/grants", get(admin::list_grants))
        .route("/admin/grants", post(admin::create_grant))
        .route("/admin/grants/{email}", delete(admin::delete_grant))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
        .with_state(state);

    Router::new().merge(public).merge(admin)
}
