//! Internal event bus between sessions and the lifecycle state machine.
//!
//! Every callback is tagged with the id of the session that produced it, so
//! callbacks from a session that has since been replaced can be discarded.

use adbridge_common::SessionId;
use tokio::sync::mpsc;

use super::SessionEvent;

/// A session callback tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEnvelope {
    pub session_id: SessionId,
    pub event: SessionEvent,
}

/// Sending half handed to a session on initialization.
#[derive(Debug, Clone)]
pub struct SessionEventSender {
    session_id: SessionId,
    tx: mpsc::UnboundedSender<SessionEnvelope>,
}

impl SessionEventSender {
    pub fn new(session_id: SessionId, tx: mpsc::UnboundedSender<SessionEnvelope>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Push a callback. Returns `false` once the bridge is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx
            .send(SessionEnvelope {
                session_id: self.session_id,
                event,
            })
            .is_ok()
    }
}

/// Receiving half owned by the lifecycle.
#[derive(Debug)]
pub struct SessionBus {
    tx: mpsc::UnboundedSender<SessionEnvelope>,
    rx: mpsc::UnboundedReceiver<SessionEnvelope>,
}

impl SessionBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A sender bound to one session.
    pub fn sender(&self, session_id: SessionId) -> SessionEventSender {
        SessionEventSender::new(session_id, self.tx.clone())
    }

    /// Drain every queued callback belonging to `current`. Callbacks from
    /// other sessions are dropped.
    pub fn drain(&mut self, current: Option<SessionId>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = self.rx.try_recv() {
            if Some(envelope.session_id) == current {
                events.push(envelope.event);
            } else {
                tracing::debug!(
                    session_id = %envelope.session_id,
                    "Dropping callback from stale session"
                );
            }
        }
        events
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}
