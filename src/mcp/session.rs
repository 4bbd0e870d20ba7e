//! Per-connection sessions and the process-wide session table.
//!
//! A [`Session`] owns the lifecycle state of one SSE connection, the table of
//! in-flight requests (correlation id to cancellation token) and the sending
//! half of its outbound queue. The receiving half is handed to the transport,
//! which drains it onto the push channel.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::mcp::codec::{self, Message};
use crate::mcp::protocol::RequestId;
use crate::metrics::Metrics;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Channel open, handshake not completed.
    Init,
    /// Handshake complete, tool operations permitted.
    Ready,
    /// Terminal.
    Closed,
}

/// Server-side state for one logical client connection.
pub struct Session {
    id: String,
    state: RwLock<SessionState>,
    pending: DashMap<RequestId, CancellationToken>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session and the receiving end of its outbound queue.
    pub fn new(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            id: id.into(),
            state: RwLock::new(SessionState::Init),
            pending: DashMap::new(),
            outbound: tx,
            shutdown: CancellationToken::new(),
            created_at: Utc::now(),
        };
        (session, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Complete the handshake: `Init` becomes `Ready`.
    pub fn initialize(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match *state {
            SessionState::Init => {
                *state = SessionState::Ready;
                debug!("Session {} is ready", self.id);
                Ok(())
            }
            SessionState::Ready => Err(Error::ProtocolSequencing(
                "session is already initialized".to_string(),
            )),
            SessionState::Closed => Err(Error::SessionClosed(self.id.clone())),
        }
    }

    /// Open a correlation entry for an in-flight request.
    ///
    /// The returned token is cancelled when the request is cancelled by the
    /// client or when the session closes.
    pub fn track(&self, id: RequestId) -> Result<CancellationToken> {
        if self.is_closed() {
            return Err(Error::SessionClosed(self.id.clone()));
        }

        match self.pending.entry(id) {
            Entry::Occupied(entry) => Err(Error::DuplicateRequest(entry.key().to_string())),
            Entry::Vacant(entry) => {
                // A child of an already cancelled token starts cancelled, so a
                // request racing with close() still observes the shutdown.
                let token = self.shutdown.child_token();
                entry.insert(token.clone());
                Ok(token)
            }
        }
    }

    /// Resolve a correlation entry. Returns `false` if the entry was already
    /// cancelled, in which case the caller must discard its result.
    pub fn complete(&self, id: &RequestId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Cancel one in-flight request.
    pub fn cancel_request(&self, id: &RequestId) -> bool {
        match self.pending.remove(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of in-flight requests.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Encode a message and append it to the outbound queue.
    ///
    /// Never waits for the queue to drain.
    pub fn enqueue(&self, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed(self.id.clone()));
        }
        let frame = codec::encode(message)?;
        self.outbound
            .send(frame)
            .map_err(|_| Error::SessionClosed(self.id.clone()))
    }

    /// Token cancelled once the session closes.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Move to `Closed` and cancel every correlation entry.
    ///
    /// Returns the number of entries that were still pending.
    pub fn close(&self) -> usize {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = SessionState::Closed;
        self.shutdown.cancel();

        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.cancel_request(id)).count()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending", &self.pending.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Process-wide table of active sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    metrics: Arc<Metrics>,
}

impl SessionRegistry {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            metrics,
        }
    }

    /// Allocate a session with a fresh identifier, in state `Init`.
    pub fn create(&self) -> (Arc<Session>, mpsc::UnboundedReceiver<String>) {
        loop {
            let id = Uuid::new_v4().simple().to_string();
            if let Entry::Vacant(entry) = self.sessions.entry(id.clone()) {
                let (session, rx) = Session::new(id);
                let session = Arc::new(session);
                entry.insert(session.clone());
                self.metrics.session_opened();
                info!("Session {} opened", session.id());
                return (session, rx);
            }
        }
    }

    /// Look up an active session.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    /// Remove a session, cancelling its pending requests. Idempotent.
    pub fn remove(&self, id: &str) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                let cancelled = session.close();
                self.metrics.session_closed();
                info!(
                    "Session {} closed ({} pending requests cancelled)",
                    id, cancelled
                );
                true
            }
            None => false,
        }
    }

    /// Close every session, used on shutdown.
    pub fn close_all(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
