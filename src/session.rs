use std::{
    collections::HashMap,
    sync::RwLock,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

/// Key of an authenticated provider session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session registry unavailable")]
    Unavailable,
}

/// Tracks sessions that were logged out locally.
pub trait SessionRegistry: Send + Sync {
    /// `retain_until` is the unix time after which no token of the session
    /// is accepted anyway and the entry may be forgotten.
    fn invalidate(&self, session: &SessionId, retain_until: u64) -> Result<(), SessionError>;

    fn is_invalidated(&self, session: &SessionId) -> Result<bool, SessionError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessions {
    invalidated: RwLock<HashMap<SessionId, u64>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRegistry for InMemorySessions {
    fn invalidate(&self, session: &SessionId, retain_until: u64) -> Result<(), SessionError> {
        let now = now_secs();
        let mut invalidated = self
            .invalidated
            .write()
            .map_err(|_| SessionError::Unavailable)?;
        invalidated.retain(|_, until| *until >= now);
        let until = invalidated.entry(session.clone()).or_insert(retain_until);
        *until = (*until).max(retain_until);
        tracing::debug!("{} invalidated sessions tracked", invalidated.len());
        Ok(())
    }

    fn is_invalidated(&self, session: &SessionId) -> Result<bool, SessionError> {
        let invalidated = self
            .invalidated
            .read()
            .map_err(|_| SessionError::Unavailable)?;
        Ok(invalidated.contains_key(session))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
