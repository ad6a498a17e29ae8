//! Adbridge - server-side stitched ads presented as client-side ads
//!
//! A [`Bridge`] sits between a [`PlaybackEngine`] and an [`AdSession`]. The
//! engine plays one stitched stream; consumers see a content timeline with
//! the ads removed, ads that can be listed and skipped, and seeks that are
//! checked against an [`AdPolicy`].
//!
//! # Modules
//!
//! - `timeline` - absolute/content time mapping over the known ad breaks
//! - `lifecycle` - the ad session state machine and ad immunity
//! - `policy` - pluggable rules for seek, skip, mute, pause and speed
//! - `timed_metadata` - in-band tag extraction and date-range emulation
//! - `bridge` - the facade and event router
//! - `config` - [`BridgeConfig`] and TOML loading

pub mod ads;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod policy;
pub mod session;
pub mod timed_metadata;
pub mod timeline;

pub use ads::{Ad, AdBreak, AdExtensions, CompanionAd};
pub use bridge::Bridge;
pub use config::{AdImmunityConfig, BridgeConfig};
pub use engine::{Metadata, PlaybackEngine, PlayerEvent, PlayerEventKind, SourceConfig};
pub use error::{Error, PolicyErrorCode, Result, SessionErrorCode};
pub use events::{BridgeEvent, Event, EventBus, EventOrigin};
pub use lifecycle::LifecycleState;
pub use policy::{AdPolicy, DefaultPolicy, PolicyContext};
pub use session::{
    AdSession, PlayerSignal, SessionEvent, SessionEventSender, SessionFactory, SessionInit,
    SessionReady, TrackingEvent,
};
pub use timeline::{StreamPart, Timeline};
