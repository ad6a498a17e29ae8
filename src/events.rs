//! Consumer-facing events.
//!
//! Native engine events that survive suppression are forwarded as
//! [`BridgeEvent::Player`] with their times mapped to content time. Ad
//! lifecycle, policy and session errors are layered over them.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events. Consumers read from their receiver on their
//! own schedule, so a slow handler never runs inside bridge bookkeeping.

use adbridge_common::{Quartile, SessionId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ads::{Ad, AdBreak};
use crate::config::AdImmunityConfig;
use crate::engine::PlayerEvent;
use crate::error::{PolicyErrorCode, SessionErrorCode};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventOrigin
// ---------------------------------------------------------------------------

/// Where an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// Forwarded from the playback engine.
    Player,
    /// Produced by the bridge itself.
    Bridge,
}

// ---------------------------------------------------------------------------
// BridgeEvent
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Player(PlayerEvent),

    // -- Ad lifecycle --------------------------------------------------------
    AdBreakStarted { ad_break: AdBreak },
    AdBreakFinished { ad_break: AdBreak },
    AdStarted { ad: Ad },
    AdFinished { ad: Ad },
    AdQuartile { ad_id: String, quartile: Quartile },
    AdSkipped { ad: Ad },
    AdClicked {
        ad_id: String,
        click_through_url: Option<String>,
    },

    // -- Errors --------------------------------------------------------------
    YospaceError {
        code: SessionErrorCode,
        message: String,
    },
    PolicyError {
        code: PolicyErrorCode,
        message: String,
    },

    // -- Ad immunity ---------------------------------------------------------
    AdImmunityConfigured { config: AdImmunityConfig },
    AdImmunityStarted { duration: f64 },
    AdImmunityEnded,

    /// End of content reached by skipping the final ad.
    PlaybackFinished,
}

impl BridgeEvent {
    pub fn origin(&self) -> EventOrigin {
        match self {
            Self::Player(_) => EventOrigin::Player,
            _ => EventOrigin::Bridge,
        }
    }

    pub fn session_error(code: SessionErrorCode) -> Self {
        Self::YospaceError {
            code,
            message: code.message().to_string(),
        }
    }

    pub fn policy_error(code: PolicyErrorCode) -> Self {
        Self::PolicyError {
            code,
            message: code.message().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Session that was live when the event was emitted.
    pub session_id: Option<SessionId>,
    /// What happened.
    pub payload: BridgeEvent,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(session_id: Option<SessionId>, payload: BridgeEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            session_id,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, session_id: Option<SessionId>, payload: BridgeEvent) {
        let event = Event::new(session_id, payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
