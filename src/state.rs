use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::catalog::TemplateCatalog;
use crate::imaging::ProfileSettings;
use crate::llm::GenerationGateway;
use crate::session::{Session, SessionHandle, SessionSettings};

/// Process-wide read-only context plus one session per connection.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<TemplateCatalog>,
    pub gateway: Arc<dyn GenerationGateway>,
    pub profile_settings: ProfileSettings,
    pub session_settings: SessionSettings,
    sessions: Arc<Mutex<HashMap<u64, SessionHandle>>>,
    next_connection: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        catalog: TemplateCatalog,
        gateway: Arc<dyn GenerationGateway>,
        profile_settings: ProfileSettings,
        session_settings: SessionSettings,
    ) -> Self {
        AppState {
            catalog: Arc::new(catalog),
            gateway,
            profile_settings,
            session_settings,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn open_session(&self) -> (u64, SessionHandle) {
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let handle = SessionHandle::new(Session::new(self.session_settings));
        self.sessions.lock().insert(id, handle.clone());
        debug!("Opened session {}", id);
        (id, handle)
    }

    pub fn close_session(&self, id: u64) -> bool {
        let removed = self.sessions.lock().remove(&id).is_some();
        if removed {
            debug!("Closed session {}", id);
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}
