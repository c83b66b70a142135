//! Per-session admission control: at most one run in flight per session id.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EngineError;

struct ActiveRun {
    execution_id: String,
    cancel: CancellationToken,
}

/// Sessions with a run in flight.
///
/// **Interaction**: Attached with `Engine::with_sessions`; `Engine::start` and
/// `Engine::resume` call [`SessionRegistry::admit`] before spawning and hold the returned
/// lease until the run task ends. A suspended run releases its session.
#[derive(Default)]
pub struct SessionRegistry {
    active: DashMap<String, ActiveRun>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `session_id` for `execution_id`, or fails with `SessionConflict` when another
    /// run holds it.
    pub fn admit(
        self: &Arc<Self>,
        session_id: &str,
        execution_id: &str,
        cancel: CancellationToken,
    ) -> Result<SessionLease, EngineError> {
        match self.active.entry(session_id.to_string()) {
            Entry::Occupied(held) => {
                warn!(
                    session_id,
                    execution_id,
                    active_execution_id = %held.get().execution_id,
                    "Session busy, run refused"
                );
                Err(EngineError::SessionConflict(session_id.to_string()))
            }
            Entry::Vacant(slot) => {
                slot.insert(ActiveRun {
                    execution_id: execution_id.to_string(),
                    cancel,
                });
                debug!(session_id, execution_id, "Session admitted");
                Ok(SessionLease {
                    registry: Arc::clone(self),
                    session_id: session_id.to_string(),
                    execution_id: execution_id.to_string(),
                })
            }
        }
    }

    /// Cancels the session's active run. Returns false when the session is idle.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.active.get(session_id) {
            Some(run) => {
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id)
    }

    pub fn active_execution(&self, session_id: &str) -> Option<String> {
        self.active.get(session_id).map(|r| r.execution_id.clone())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    fn release(&self, session_id: &str, execution_id: &str) {
        if self
            .active
            .remove_if(session_id, |_, run| run.execution_id == execution_id)
            .is_some()
        {
            debug!(session_id, execution_id, "Session released");
        }
    }
}

/// Holds a session until dropped.
pub struct SessionLease {
    registry: Arc<SessionRegistry>,
    session_id: String,
    execution_id: String,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.registry.release(&self.session_id, &self.execution_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_admission_conflicts_until_lease_drops() {
        let reg = Arc::new(SessionRegistry::new());
        let lease = reg
            .admit("s1", "e1", CancellationToken::new())
            .unwrap();
        assert!(reg.is_active("s1"));
        assert!(matches!(
            reg.admit("s1", "e2", CancellationToken::new()),
            Err(EngineError::SessionConflict(s)) if s == "s1"
        ));
        let other = reg.admit("s2", "e3", CancellationToken::new()).unwrap();
        assert_eq!(reg.active_count(), 2);

        drop(lease);
        assert!(!reg.is_active("s1"));
        assert!(reg.admit("s1", "e4", CancellationToken::new()).is_ok());
        drop(other);
    }

    #[test]
    fn cancel_reaches_active_token() {
        let reg = Arc::new(SessionRegistry::new());
        let token = CancellationToken::new();
        let _lease = reg.admit("s1", "e1", token.clone()).unwrap();
        assert_eq!(reg.active_execution("s1").as_deref(), Some("e1"));
        assert!(reg.cancel("s1"));
        assert!(token.is_cancelled());
        assert!(!reg.cancel("idle"));
    }
}
