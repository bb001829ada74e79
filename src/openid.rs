use jsonwebtoken::{jwk, jwk::AlgorithmParameters, DecodingKey};
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};
use thiserror::Error;

type Keys = HashMap<String, DecodingKey>;

/// Provider signing keys by `kid`, shared between requests and the refresh task.
#[derive(Clone, Default)]
pub struct Jwks(Arc<RwLock<Keys>>);

impl Jwks {
    pub fn get(&self, kid: &str) -> Result<Option<DecodingKey>, OpenIDError> {
        let keys = self.0.read().map_err(|_| OpenIDError::InternalServerError)?;
        Ok(keys.get(kid).cloned())
    }

    pub fn insert(&self, kid: &str, key: DecodingKey) -> Result<(), OpenIDError> {
        let mut keys = self.0.write().map_err(|_| OpenIDError::InternalServerError)?;
        keys.insert(kid.to_owned(), key);
        Ok(())
    }

    fn replace(&self, new_keys: Keys) -> Result<(), OpenIDError> {
        let mut keys = self.0.write().map_err(|_| OpenIDError::InternalServerError)?;
        *keys = new_keys;
        Ok(())
    }
}

pub async fn init(jwks: &Jwks, sec_interval: u64, uri: String) -> Result<(), OpenIDError> {
    update_jwks(jwks, &uri).await?;
    if sec_interval > 0 {
        let jwks = jwks.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(sec_interval)).await;
                match update_jwks(&jwks, &uri).await {
                    Ok(_) => tracing::debug!("jwks updated"),
                    Err(e) => tracing::error!("Jwks not updated: {:?}", e),
                };
            }
        });
    }
    Ok(())
}

async fn update_jwks(jwks: &Jwks, uri: &str) -> Result<(), OpenIDError> {
    let new_keys = decoding_keys(uri).await?;
    tracing::info!("loaded {} signing keys from {}", new_keys.len(), uri);
    jwks.replace(new_keys)
}

#[derive(Deserialize)]
struct Oid {
    jwks_uri: String,
}

async fn decoding_keys(uri: &str) -> Result<Keys, OpenIDError> {
    let jwks_uri = reqwest::get(uri)
        .await
        .map_err(|_| OpenIDError::InvalidWellKnownUri)?
        .json::<Oid>()
        .await
        .map_err(|_| OpenIDError::MissingOpenIDConfiguration)?
        .jwks_uri;
    Ok(jwks_to_decoding_keys(
        &reqwest::get(&jwks_uri)
            .await
            .map_err(|_| OpenIDError::InvalidJwksUri)?
            .json()
            .await
            .map_err(|_| OpenIDError::MissingJwksSet)?,
    ))
}

fn jwks_to_decoding_keys(jwks: &jwk::JwkSet) -> Keys {
    let mut hm = HashMap::new();
    for jwk in &jwks.keys {
        if let AlgorithmParameters::RSA(ref rsa) = jwk.algorithm {
            if let Ok(decoding_key) = DecodingKey::from_rsa_components(&rsa.n, &rsa.e) {
                if let Some(kid) = jwk.common.key_id.clone() {
                    hm.insert(kid, decoding_key);
                }
            }
        }
    }
    hm
}

#[derive(Debug, Error)]
pub enum OpenIDError {
    #[error("well-known openid configuration unreachable")]
    InvalidWellKnownUri,
    #[error("jwks uri unreachable")]
    InvalidJwksUri,
    #[error("openid configuration without jwks_uri")]
    MissingOpenIDConfiguration,
    #[error("jwks uri did not return a key set")]
    MissingJwksSet,
    #[error("key store unavailable")]
    InternalServerError,
}
