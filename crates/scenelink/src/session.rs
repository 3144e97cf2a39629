//! # Sessions
//!
//! Every connected remote caller is a session with a 64-bit id. The registry
//! maps ids to the messenger that reaches that session.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use flexrpc::Value;

use crate::messenger::Messenger;

/// Identifies one connected remote caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

impl From<SessionId> for Value {
    fn from(id: SessionId) -> Self {
        Value::Int(id.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    SessionNotFound(SessionId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "Session not found: {}", id),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Live sessions, safe to read and mutate from any thread.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<dyn Messenger>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session, replacing any messenger already registered under `id`.
    pub fn register(&self, id: SessionId, messenger: Arc<dyn Messenger>) -> Arc<dyn Messenger> {
        if self.sessions.insert(id, messenger.clone()).is_some() {
            tracing::warn!(session = %id, "session re-registered, previous messenger replaced");
        } else {
            tracing::debug!(session = %id, "session registered");
        }
        messenger
    }

    pub fn lookup(&self, id: SessionId) -> Result<Arc<dyn Messenger>> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(Error::SessionNotFound(id))
    }

    pub fn unregister(&self, id: SessionId) -> Option<Arc<dyn Messenger>> {
        let removed = self.sessions.remove(&id).map(|(_, messenger)| messenger);
        if removed.is_some() {
            tracing::debug!(session = %id, "session unregistered");
        }
        removed
    }

    /// Removes `id` only while it still maps to `messenger`.
    ///
    /// A connection that closes after its id was re-registered must not evict
    /// the newer messenger.
    pub fn unregister_if(&self, id: SessionId, messenger: &Arc<dyn Messenger>) -> bool {
        let removed = self
            .sessions
            .remove_if(&id, |_, current| Arc::ptr_eq(current, messenger))
            .is_some();
        if removed {
            tracing::debug!(session = %id, "session unregistered");
        }
        removed
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Snapshot of the registered ids, in no particular order.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
