use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod logout;
pub mod openid;
pub mod session;

use auth::{AuthError, Principal};
use config::Config;
use logout::{LogoutError, LogoutResult, RequestOrigin};
use openid::{Jwks, OpenIDError};
use session::{InMemorySessions, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub issuer_uri: String,
    pub audience: Option<String>,
    pub keys: Jwks,
    pub sessions: Arc<dyn SessionRegistry>,
}

impl AppState {
    pub fn new(config: &Config, keys: Jwks) -> Self {
        Self {
            issuer_uri: config.issuer_uri.clone(),
            audience: config.audience.clone(),
            keys,
            sessions: Arc::new(InMemorySessions::new()),
        }
    }
}

/// Loads the provider keys and builds the router.
pub async fn app(config: &Config) -> Result<Router, OpenIDError> {
    let keys = Jwks::default();
    openid::init(&keys, config.jwks_refresh_secs, config.well_known_uri()).await?;

    Ok(router(AppState::new(config, keys)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/unauthenticated", get(unauthenticated))
        .route("/api/logout", post(logout))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Greeting {
    hello: Option<String>,
    #[serde(rename = "your email is")]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Status {
    #[serde(rename = "this is")]
    this_is: &'static str,
}

async fn health() -> &'static str {
    "OK"
}

async fn index(principal: Principal) -> Json<Greeting> {
    Json(Greeting {
        hello: principal.name,
        email: principal.email,
    })
}

async fn unauthenticated() -> Json<Status> {
    Json(Status {
        this_is: "unauthenticated endpoint",
    })
}

async fn logout(
    State(state): State<AppState>,
    origin: RequestOrigin,
    principal: Result<Principal, AuthError>,
) -> Result<Json<LogoutResult>, LogoutError> {
    match principal {
        Ok(principal) => {
            state
                .sessions
                .invalidate(&principal.session, principal.retain_until)?;
            tracing::info!("session of {:?} logged out", principal.email);
        }
        Err(AuthError::InvalidToken) => tracing::debug!("logout without a valid session"),
        Err(AuthError::InternalServer) => return Err(LogoutError::SessionLookup),
    }

    Ok(Json(LogoutResult {
        message: "Logged out successfully".to_owned(),
        keycloak_logout_url: logout::logout_url(&state.issuer_uri, &origin),
    }))
}
