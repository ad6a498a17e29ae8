//! The ad-decisioning session seam.
//!
//! A session resolves ad breaks for one loaded source and reports its
//! lifecycle callbacks over the internal event bus (see [`bus`]). The
//! lifecycle state machine is the only owner of a live session.

pub mod bus;

use adbridge_common::{PlaybackMode, Quartile, SessionId};
use adbridge_media::{DateRangeSignal, TagRecord};
use async_trait::async_trait;

use crate::ads::{Ad, AdBreak};
use crate::engine::SourceConfig;
use crate::error::SessionErrorCode;

pub use bus::{SessionEnvelope, SessionEventSender};

/// Everything a session needs to resolve.
#[derive(Debug, Clone)]
pub struct SessionInit {
    pub session_id: SessionId,
    pub url: String,
    pub mode: PlaybackMode,
    /// Where the session pushes its lifecycle callbacks.
    pub events: SessionEventSender,
}

/// A resolved session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReady {
    /// Stitched playback URL handed to the engine.
    pub playback_url: String,
}

/// Tracking events a session can report for the current ad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingEvent {
    Impression,
    Start,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    Other(String),
}

impl TrackingEvent {
    /// The quartile this tracking event marks, if any.
    pub fn quartile(&self) -> Option<Quartile> {
        match self {
            Self::FirstQuartile => Some(Quartile::FirstQuartile),
            Self::Midpoint => Some(Quartile::Midpoint),
            Self::ThirdQuartile => Some(Quartile::ThirdQuartile),
            _ => None,
        }
    }

    /// Parse a VAST tracking event name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "impression" => Self::Impression,
            "start" => Self::Start,
            "firstQuartile" => Self::FirstQuartile,
            "midpoint" => Self::Midpoint,
            "thirdQuartile" => Self::ThirdQuartile,
            "complete" => Self::Complete,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Lifecycle callbacks pushed by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AdBreakStarted(AdBreak),
    AdStarted(Ad),
    AdFinished,
    AdBreakFinished,
    Tracking(TrackingEvent),
    /// The break list changed (live streams).
    AnalyticsUpdated(Vec<AdBreak>),
}

/// Player state forwarded to the session so it can drive its callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerSignal {
    /// First play of this load.
    PlaybackStarted,
    Resumed,
    Paused,
    /// Absolute playhead.
    Playhead(f64),
    Seeked(f64),
    StallStarted,
    StallEnded,
    Muted(bool),
    Metadata(TagRecord),
    DateRange(DateRangeSignal),
}

/// An ad-decisioning session.
#[async_trait]
pub trait AdSession: Send {
    /// Resolve the session. Callbacks may be pushed as soon as this returns.
    async fn initialize(
        &mut self,
        init: SessionInit,
    ) -> std::result::Result<SessionReady, SessionErrorCode>;

    /// Playback mode the session resolved to.
    fn mode(&self) -> PlaybackMode;

    /// All known breaks with absolute starts.
    fn ad_breaks(&self) -> Vec<AdBreak>;

    fn on_player_signal(&mut self, signal: PlayerSignal);

    /// Report a click on the current ad.
    fn report_click(&mut self);

    /// Skip the current ad so skip tracking fires.
    fn skip_current_ad(&mut self);

    /// Mark a break inactive so the session stops reporting it.
    fn deactivate_break(&mut self, _start: f64) {}

    fn shutdown(&mut self);
}

/// Creates one session per load.
pub trait SessionFactory: Send {
    fn create(&self, source: &SourceConfig) -> Box<dyn AdSession>;
}

impl<F> SessionFactory for F
where
    F: Fn(&SourceConfig) -> Box<dyn AdSession> + Send,
{
    fn create(&self, source: &SourceConfig) -> Box<dyn AdSession> {
        self(source)
    }
}
