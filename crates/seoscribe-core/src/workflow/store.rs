//! In-memory session registry with single-flight guards.
//!
//! Each session sits behind its own mutex. Operations acquire it without
//! waiting: a second request for a session that already has an operation
//! in flight is rejected with [`WorkflowError::Busy`] instead of queueing
//! behind the first.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::error::WorkflowError;
use crate::session::Session;

/// Exclusive access to one session for the duration of an operation.
pub type SessionGuard = OwnedMutexGuard<Session>;

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh session and return a copy of it.
    pub async fn create(&self) -> Session {
        let session = Session::new();
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::new(Mutex::new(session.clone())));
        tracing::debug!(session_id = %session.id, "session created");
        session
    }

    async fn slot(&self, id: Uuid) -> Result<Arc<Mutex<Session>>, WorkflowError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(WorkflowError::UnknownSession(id))
    }

    /// Take the session's guard, failing with `Busy` if another operation
    /// holds it.
    pub async fn acquire(&self, id: Uuid) -> Result<SessionGuard, WorkflowError> {
        self.slot(id)
            .await?
            .try_lock_owned()
            .map_err(|_| WorkflowError::Busy(id))
    }

    /// A point-in-time copy of the session.
    pub async fn snapshot(&self, id: Uuid) -> Result<Session, WorkflowError> {
        let slot = self.slot(id).await?;
        let guard = slot.try_lock().map_err(|_| WorkflowError::Busy(id))?;
        Ok(guard.clone())
    }

    /// Drop a session. An operation still holding its guard finishes against
    /// the detached session.
    pub async fn remove(&self, id: Uuid) -> Result<(), WorkflowError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| tracing::debug!(session_id = %id, "session removed"))
            .ok_or(WorkflowError::UnknownSession(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
