use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, TypedHeader},
    headers::{authorization::Bearer, Authorization},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, decode_header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::session::SessionId;
use crate::AppState;

/// Seconds a token is still accepted past its `exp`.
pub const LEEWAY_SECS: u64 = 60;

/// Keycloak's default SSO session max lifespan. A `sid` outlives the token
/// it was read from, since refreshed tokens keep carrying it.
const SID_RETENTION_SECS: u64 = 10 * 60 * 60;

/// Claims of a provider access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// The authenticated identity of the current request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub name: Option<String>,
    pub email: Option<String>,
    pub claims: HashMap<String, Value>,
    pub session: SessionId,
    /// Unix time until which a logged out session must stay rejected.
    pub retain_until: u64,
}

impl Principal {
    fn from_claims(claims: Claims, token: &str) -> Self {
        let accepted_until = claims.exp + LEEWAY_SECS;
        let (session, retain_until) = match claims.sid {
            Some(sid) => (sid, accepted_until + SID_RETENTION_SECS),
            None => (
                claims.jti.unwrap_or_else(|| token.to_owned()),
                accepted_until,
            ),
        };
        Self {
            name: claims.name,
            email: claims.email,
            claims: claims.extra,
            session: SessionId(session),
            retain_until,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, &state)
                .await
                .map_err(|_| AuthError::InvalidToken)?;
        let kid = decode_header(bearer.token())
            .map_err(|_| AuthError::InvalidToken)?
            .kid
            .ok_or(AuthError::InvalidToken)?;
        let key = state
            .keys
            .get(&kid)
            .map_err(|_| AuthError::InternalServer)?
            .ok_or(AuthError::InvalidToken)?;

        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_issuer(&[state.issuer_uri.as_str()]);
        match &state.audience {
            Some(audience) => {
                validation.set_audience(&[audience.as_str()]);
                validation.set_required_spec_claims(&["exp", "iss", "aud"]);
            }
            None => validation.set_required_spec_claims(&["exp", "iss"]),
        }
        let token_data = decode::<Claims>(bearer.token(), &key, &validation).map_err(|e| {
            tracing::debug!("{:?}", e);
            AuthError::InvalidToken
        })?;

        let principal = Principal::from_claims(token_data.claims, bearer.token());
        if state
            .sessions
            .is_invalidated(&principal.session)
            .map_err(|_| AuthError::InternalServer)?
        {
            tracing::debug!("token of a logged out session");
            return Err(AuthError::InvalidToken);
        }

        Ok(principal)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::InternalServer => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        tracing::debug!("{}, {}", status, error_message);

        let body = Json(json!({
            "error": error_message,
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
    #[error("internal server error")]
    InternalServer,
}
