//! Process-wide map of open connections to their departure sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::session::DeparturesSession;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("a session is already registered for connection {connection_id}")]
    DuplicateSession { connection_id: String },
}

/// Maps connection ids to live sessions.
///
/// Constructed per server instance and injected wherever it is needed, so
/// tests can run independent registries side by side. All operations are
/// atomic with respect to a single connection key; the message-handling and
/// close paths may race on the same connection safely.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<DeparturesSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session for `connection_id`.
    ///
    /// Fails if one is already registered; callers replacing a session must
    /// [`remove`](Self::remove) (and stop) the old one first.
    pub fn register(
        &self,
        connection_id: &str,
        session: Arc<DeparturesSession>,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(connection_id) {
            return Err(RegistryError::DuplicateSession {
                connection_id: connection_id.to_string(),
            });
        }
        sessions.insert(connection_id.to_string(), session);
        Ok(())
    }

    pub fn lookup(&self, connection_id: &str) -> Option<Arc<DeparturesSession>> {
        self.sessions.lock().unwrap().get(connection_id).cloned()
    }

    /// Removes and returns the session, if present. Idempotent; the caller
    /// is expected to call [`DeparturesSession::stop_updates`] on the result.
    pub fn remove(&self, connection_id: &str) -> Option<Arc<DeparturesSession>> {
        self.sessions.lock().unwrap().remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session(id: &str) -> Arc<DeparturesSession> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(DeparturesSession::new(id.to_string(), Vec::new(), tx))
    }

    #[test]
    fn register_then_lookup() {
        let registry = SessionRegistry::new();
        registry.register("conn-1", session("conn-1")).unwrap();
        assert!(registry.lookup("conn-1").is_some());
        assert!(registry.lookup("conn-2").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = SessionRegistry::new();
        registry.register("conn-1", session("conn-1")).unwrap();
        let err = registry.register("conn-1", session("conn-1")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateSession {
                connection_id: "conn-1".to_string()
            }
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.register("conn-1", session("conn-1")).unwrap();
        assert!(registry.remove("conn-1").is_some());
        assert!(registry.remove("conn-1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn removal_allows_re_registration() {
        let registry = SessionRegistry::new();
        registry.register("conn-1", session("conn-1")).unwrap();
        registry.remove("conn-1");
        registry.register("conn-1", session("conn-1")).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
