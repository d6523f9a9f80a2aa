//! Registry of open sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use encoding_rs::Encoding;
use tracing::{debug, info};

use super::{SESSION_TARGET, Session, SessionId};
use crate::transport::Transport;

/// Tracks every open session so the reaper and shutdown can find them.
#[derive(Debug)]
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl SessionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session over `transport` and registers it.
    pub fn open(&self, transport: Box<dyn Transport>, charset: &'static Encoding) -> Arc<Session> {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let session = Arc::new(Session::new(id, transport, charset));
        let open = {
            let mut sessions = self.lock();
            sessions.insert(id, Arc::clone(&session));
            sessions.len()
        };
        debug!(target: SESSION_TARGET, session_id = %id, open, "session opened");
        session
    }

    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.lock().get(&id).cloned()
    }

    /// Forgets the session. The caller is responsible for destroying it.
    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.lock().remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Destroys and forgets every session idle for at least `timeout`.
    ///
    /// A session with a job running counts as active: the drain loop touches
    /// it on every iteration.
    pub fn reap_idle(&self, timeout: Duration) -> Vec<SessionId> {
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.lock();
            let ids: Vec<SessionId> = sessions
                .values()
                .filter(|session| session.idle_for() >= timeout)
                .map(|session| session.id())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        expired
            .iter()
            .map(|session| {
                info!(
                    target: SESSION_TARGET,
                    session_id = %session.id(),
                    idle_ms = session.idle_for().as_millis(),
                    "reaping idle session"
                );
                session.destroy();
                session.id()
            })
            .collect()
    }

    /// Destroys every open session.
    pub fn destroy_all(&self) {
        let sessions: Vec<Arc<Session>> = self.lock().drain().map(|(_, session)| session).collect();
        for session in sessions {
            session.destroy();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::tests::support::RecordingTransport;

    fn open(manager: &SessionManager) -> Arc<Session> {
        let (transport, _) = RecordingTransport::new();
        manager.open(Box::new(transport), encoding_rs::UTF_8)
    }

    #[test]
    fn ids_are_distinct() {
        let manager = SessionManager::new();
        let first = open(&manager);
        let second = open(&manager);
        assert_ne!(first.id(), second.id());
        assert_eq!(manager.len(), 2);
        assert!(manager.get(first.id()).is_some());
    }

    #[test]
    fn reaps_only_idle_sessions() {
        let manager = SessionManager::new();
        let stale = open(&manager);
        thread::sleep(Duration::from_millis(60));
        let fresh = open(&manager);

        let reaped = manager.reap_idle(Duration::from_millis(50));
        assert_eq!(reaped, vec![stale.id()]);
        assert!(stale.is_destroyed());
        assert!(!fresh.is_destroyed());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn destroy_all_empties_the_manager() {
        let manager = SessionManager::new();
        let first = open(&manager);
        let second = open(&manager);
        manager.destroy_all();
        assert!(manager.is_empty());
        assert!(first.is_destroyed() && second.is_destroyed());
    }
}
