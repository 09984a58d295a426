use doc_translator_core::{AppConfig, Error, TextTransform, Workflow, create_gateway};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::helpers::{OptionExt, RouteResult, error_response};

/// One user's workflow plus bookkeeping for eviction
pub struct Session {
    /// Locked for the whole duration of an action
    pub workflow: Arc<Mutex<Workflow>>,
    pub last_access: Instant,
}

impl Session {
    fn new(workflow: Workflow) -> Self {
        Self {
            workflow: Arc::new(Mutex::new(workflow)),
            last_access: Instant::now(),
        }
    }
}

/// Global application state
pub struct AppState {
    /// Active sessions indexed by UUID
    sessions: RwLock<HashMap<Uuid, Session>>,
    /// Shared by every session's workflow
    gateway: Arc<dyn TextTransform>,
    pub config: AppConfig,
    /// Idle time after which a session is evicted
    pub session_ttl: Duration,
}

impl AppState {
    pub fn new(config: AppConfig, session_ttl: Duration) -> doc_translator_core::Result<Self> {
        let gateway = create_gateway(&config.gateway)?;
        Ok(Self::with_gateway(config, gateway, session_ttl))
    }

    pub fn with_gateway(
        config: AppConfig,
        gateway: Arc<dyn TextTransform>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            gateway,
            config,
            session_ttl,
        }
    }

    /// Fresh workflow bound to the shared gateway
    pub fn new_workflow(&self) -> Workflow {
        Workflow::new(Arc::clone(&self.gateway), self.config.pdf.clone())
    }

    /// Register a workflow as a new session and return its ID.
    pub async fn create_session(&self, workflow: Workflow) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, Session::new(workflow));
        id
    }

    /// Look up a session's workflow, refreshing its last access time.
    ///
    /// Returns `None` if the ID is not a valid UUID or session doesn't exist.
    pub async fn get_session(&self, id: &str) -> Option<Arc<Mutex<Workflow>>> {
        let uuid = Uuid::parse_str(id).ok()?;
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&uuid)?;
        session.last_access = Instant::now();
        Some(Arc::clone(&session.workflow))
    }

    /// Take exclusive hold of a session for one action.
    ///
    /// A session already running an action answers `SessionBusy` instead of
    /// queueing the request.
    pub async fn lock_session(&self, id: &str) -> RouteResult<OwnedMutexGuard<Workflow>> {
        let workflow = self.get_session(id).await.or_not_found("Session not found")?;
        workflow
            .try_lock_owned()
            .map_err(|_| error_response(&Error::SessionBusy))
    }

    pub async fn remove_session(&self, id: &str) -> bool {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return false;
        };
        self.sessions.write().await.remove(&uuid).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Evict idle sessions. Sessions in the middle of an action are kept.
    pub async fn cleanup_old_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let before = sessions.len();

        sessions.retain(|_, session| {
            now.duration_since(session.last_access) < self.session_ttl
                || session.workflow.try_lock().is_err()
        });

        before - sessions.len()
    }
}
