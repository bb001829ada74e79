use std::{env, net::SocketAddr};
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_JWKS_REFRESH_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Issuer base URL, e.g. `https://idp.example.com/realms/app`.
    pub issuer_uri: String,
    pub audience: Option<String>,
    /// Seconds between JWKS reloads, 0 disables the refresh task.
    pub jwks_refresh_secs: u64,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn new(issuer_uri: &str) -> Self {
        Self {
            issuer_uri: issuer_uri.trim_end_matches('/').to_owned(),
            audience: None,
            jwks_refresh_secs: DEFAULT_JWKS_REFRESH_SECS,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let issuer_uri = env::var("ISSUER_URI").map_err(|_| ConfigError::Missing("ISSUER_URI"))?;
        if issuer_uri.trim().is_empty() {
            return Err(ConfigError::Missing("ISSUER_URI"));
        }

        let audience = env::var("AUTH_AUDIENCE")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let jwks_refresh_secs = match env::var("JWKS_REFRESH_SECS") {
            Ok(v) => v
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("JWKS_REFRESH_SECS"))?,
            Err(_) => DEFAULT_JWKS_REFRESH_SECS,
        };

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned())
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("BIND_ADDR"))?;

        Ok(Self {
            audience,
            jwks_refresh_secs,
            bind_addr,
            ..Self::new(issuer_uri.trim())
        })
    }

    pub fn well_known_uri(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.issuer_uri)
    }
}
