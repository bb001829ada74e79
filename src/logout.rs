use axum::{
    async_trait,
    extract::{FromRequestParts, Host},
    http::{request::Parts, uri::Authority, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_PORT: &str = "x-forwarded-port";

#[derive(Debug, Serialize)]
pub struct LogoutResult {
    pub message: String,
    #[serde(rename = "keycloakLogoutUrl")]
    pub keycloak_logout_url: String,
}

/// Where the client reached us, as needed for the post-logout redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

/// Provider logout endpoint that sends the browser back to `/unauthenticated`.
pub fn logout_url(issuer_uri: &str, origin: &RequestOrigin) -> String {
    issuer_uri.to_owned()
        + "/protocol/openid-connect/logout?redirect_uri="
        + &origin.scheme
        + "://"
        + &origin.host
        + ":"
        + &origin.port.to_string()
        + "/unauthenticated"
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = LogoutError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let scheme = header_value(&parts.headers, X_FORWARDED_PROTO)
            .or_else(|| parts.uri.scheme_str().map(str::to_owned))
            .unwrap_or_else(|| "http".to_owned())
            .to_ascii_lowercase();

        let Host(host) = Host::from_request_parts(parts, state)
            .await
            .map_err(|_| LogoutError::MissingHost)?;
        let authority = host
            .parse::<Authority>()
            .map_err(|_| LogoutError::MissingHost)?;

        let port = header_value(&parts.headers, X_FORWARDED_PORT)
            .and_then(|p| p.parse::<u16>().ok())
            .or_else(|| authority.port_u16())
            .unwrap_or(if scheme == "https" { 443 } else { 80 });

        Ok(RequestOrigin {
            scheme,
            host: authority.host().to_owned(),
            port,
        })
    }
}

// Proxies may append values; the first one is the client-facing hop.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Error)]
pub enum LogoutError {
    #[error("missing host")]
    MissingHost,
    #[error("current session could not be resolved")]
    SessionLookup,
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for LogoutError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            LogoutError::MissingHost => (StatusCode::BAD_REQUEST, "Missing host"),
            LogoutError::SessionLookup => {
                tracing::error!("logout failed: current session could not be resolved");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            LogoutError::Session(e) => {
                tracing::error!("logout failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));
        (status, body).into_response()
    }
}
