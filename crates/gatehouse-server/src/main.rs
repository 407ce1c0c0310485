use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use gatehouse_api::auth::{AppState, AppStateInner};
use gatehouse_auth::external::{ExternalVerifier, JwksCache};
use gatehouse_auth::otp::{LogOtpSender, OtpService};
use gatehouse_auth::reconcile::{fold_email, IdentityReconciler};
use gatehouse_auth::session::SessionStore;
use gatehouse_auth::token::TokenCodec;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatehouse=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("GATEHOUSE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("GATEHOUSE_DB_PATH").unwrap_or_else(|_| "gatehouse.db".into());
    let host = std::env::var("GATEHOUSE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("GATEHOUSE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let token_ttl: i64 = std::env::var("GATEHOUSE_TOKEN_TTL_SECS")
        .unwrap_or_else(|_| "604800".into())
        .parse()?;
    let otp_ttl: i64 = std::env::var("GATEHOUSE_OTP_TTL_SECS")
        .unwrap_or_else(|_| "300".into())
        .parse()?;
    let jwks_ttl: u64 = std::env::var("GATEHOUSE_JWKS_TTL_SECS")
        .unwrap_or_else(|_| "3600".into())
        .parse()?;
    let admin_email = std::env::var("GATEHOUSE_ADMIN_EMAIL").ok();

    if jwt_secret == "dev-secret-change-me" {
        warn!("GATEHOUSE_JWT_SECRET not set, using the dev secret");
    }

    // Init database
    let db = Arc::new(gatehouse_db::Database::open(&PathBuf::from(&db_path))?);

    // Seed the admin allowlist from config. One source of truth: after this,
    // the request path only ever consults the admin_grants table.
    if let Some(email) = &admin_email {
        db.upsert_admin_grant(&fold_email(email))?;
        info!("admin grant seeded for configured admin email");
    }

    // Federated verifiers share one JWKS cache.
    let jwks = Arc::new(JwksCache::new(Duration::from_secs(jwks_ttl)));
    let google = std::env::var("GATEHOUSE_GOOGLE_CLIENT_ID")
        .ok()
        .map(|client_id| ExternalVerifier::google(jwks.clone(), client_id));
    let hosted = match (
        std::env::var("GATEHOUSE_HOSTED_JWKS_URL"),
        std::env::var("GATEHOUSE_HOSTED_ISSUER"),
        std::env::var("GATEHOUSE_HOSTED_AUDIENCE"),
    ) {
        (Ok(url), Ok(issuer), Ok(audience)) => {
            Some(ExternalVerifier::new(jwks.clone(), url, issuer, audience))
        }
        _ => None,
    };

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        codec: TokenCodec::new(&jwt_secret, token_ttl),
        sessions: SessionStore::new(db.clone()),
        reconciler: IdentityReconciler::new(db.clone(), admin_email),
        otp: OtpService::new(db.clone(), Arc::new(LogOtpSender), otp_ttl),
        google,
        hosted,
    });

    // Hourly sweep of long-expired session rows. Cleanup only; liveness is
    // always checked against the row at read time.
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            match sweep_state.sessions.sweep_expired(86_400) {
                Ok(n) if n > 0 => info!("swept {n} expired sessions"),
                Ok(_) => {}
                Err(e) => warn!("session sweep failed: {e}"),
            }
        }
    });

    let app = gatehouse_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Gatehouse listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
