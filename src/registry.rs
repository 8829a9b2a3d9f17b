//! Process-wide session registry
//!
//! Owns the map from session code to session actor handle. This is the
//! only state shared across sessions; it is guarded by a mutex whose
//! critical sections are limited to create/lookup/remove and are never
//! held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::config::Config;
use crate::providers::{AnswerJudge, BoardProvider};
use crate::session::{Session, SessionCommand, SessionHandle};
use crate::types::SessionCode;

/// Registry of all live sessions, injectable and initialized once
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionCode, SessionHandle>>,
    config: Config,
    board_provider: Arc<dyn BoardProvider>,
    judge: Arc<dyn AnswerJudge>,
}

impl SessionRegistry {
    pub fn new(
        config: Config,
        board_provider: Arc<dyn BoardProvider>,
        judge: Arc<dyn AnswerJudge>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            board_provider,
            judge,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionCode, SessionHandle>> {
        // A poisoned lock only means another thread panicked mid-access;
        // the map itself is still usable.
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create a new session with a fresh unique code
    pub fn create(&self) -> (SessionCode, SessionHandle) {
        let mut sessions = self.lock();
        // Regenerate on collision; a 36^6 space makes retries rare.
        let code = loop {
            let code = SessionCode::generate();
            if !sessions.contains_key(&code) {
                break code;
            }
        };
        let handle = Session::spawn(
            code.clone(),
            self.config.clone(),
            Arc::clone(&self.board_provider),
            Arc::clone(&self.judge),
        );
        sessions.insert(code.clone(), handle.clone());
        info!("Created session {}", code);
        (code, handle)
    }

    /// Look up a session by code
    pub fn get(&self, code: &SessionCode) -> Option<SessionHandle> {
        self.lock().get(code).cloned()
    }

    /// Administratively remove a session, shutting its actor down
    pub async fn remove(&self, code: &SessionCode) {
        let handle = self.lock().remove(code);
        if let Some(handle) = handle {
            handle.send(SessionCommand::Shutdown).await;
            info!("Removed session {}", code);
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Teardown path for process shutdown: stop every session actor.
    ///
    /// Each actor cancels its own timers and drops its connections as it
    /// exits.
    pub async fn shutdown(&self) {
        let handles: Vec<(SessionCode, SessionHandle)> = self.lock().drain().collect();
        for (code, handle) in handles {
            debug!("Shutting down session {}", code);
            handle.send(SessionCommand::Shutdown).await;
        }
        info!("Session registry shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ExactMatchJudge, SampleBoardProvider};

    fn test_registry() -> SessionRegistry {
        SessionRegistry::new(
            Config::default(),
            Arc::new(SampleBoardProvider::new(1)),
            Arc::new(ExactMatchJudge),
        )
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = test_registry();
        let (code, _handle) = registry.create();

        assert_eq!(code.0.len(), 6);
        assert!(registry.get(&code).is_some());
        assert!(registry
            .get(&SessionCode::from_string("NOSUCH".to_string()))
            .is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_codes_unique() {
        let registry = test_registry();
        let (a, _) = registry.create();
        let (b, _) = registry.create();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_and_shutdown() {
        let registry = test_registry();
        let (code, _) = registry.create();
        registry.create();

        registry.remove(&code).await;
        assert!(registry.get(&code).is_none());
        assert_eq!(registry.len(), 1);

        registry.shutdown().await;
        assert!(registry.is_empty());
    }
}
