//! The playback engine seam.
//!
//! The bridge never talks to a concrete player. Everything it needs is
//! listed on [`PlaybackEngine`], and the engine's native events are fed back
//! through [`crate::Bridge::handle_player_event`].

use adbridge_common::{PlaybackMode, TimeRange};
use adbridge_media::{DateRangeSignal, TagPayload};
use async_trait::async_trait;

use crate::config::AdImmunityConfig;
use crate::Result;

/// What to play.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Manifest URL. Replaced by the stitched playback URL before it reaches
    /// the engine.
    pub url: String,
    pub mode: PlaybackMode,
    pub title: Option<String>,
    /// Overrides the bridge-wide immunity settings for this load only.
    pub immunity: Option<AdImmunityConfig>,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>, mode: PlaybackMode) -> Self {
        Self {
            url: url.into(),
            mode,
            title: None,
            immunity: None,
        }
    }

    /// Attach a per-load immunity override.
    pub fn with_immunity(mut self, immunity: AdImmunityConfig) -> Self {
        self.immunity = Some(immunity);
        self
    }
}

/// Timed metadata delivered by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    /// In-band tag (ID3, `emsg`, decoded frames or vendor string).
    Tag(TagPayload),
    /// Interval signaling (`EXT-X-DATERANGE`).
    DateRange(DateRangeSignal),
}

impl Metadata {
    /// Short type name used in logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Tag(TagPayload::Id3(_)) | Self::Tag(TagPayload::Frames(_)) => "ID3",
            Self::Tag(TagPayload::Emsg(_)) => "EMSG",
            Self::Tag(TagPayload::Vendor(_)) => "VENDOR",
            Self::DateRange(_) => "DATERANGE",
        }
    }
}

/// Native engine events. Times are on the engine's absolute timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    SourceLoaded,
    SourceUnloaded,
    Play,
    Playing { time: f64 },
    Paused { time: f64 },
    TimeChanged { time: f64 },
    Seek { position: f64, seek_target: f64 },
    Seeked,
    StallStarted,
    StallEnded,
    Muted,
    Unmuted,
    PlaybackSpeedChanged { from: f64, to: f64 },
    Metadata(Metadata),
    PlaybackFinished,
    Error { code: u32, message: String },
}

/// Discriminant of a [`PlayerEvent`], used for suppression bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEventKind {
    SourceLoaded,
    SourceUnloaded,
    Play,
    Playing,
    Paused,
    TimeChanged,
    Seek,
    Seeked,
    StallStarted,
    StallEnded,
    Muted,
    Unmuted,
    PlaybackSpeedChanged,
    Metadata,
    PlaybackFinished,
    Error,
}

impl PlayerEvent {
    pub fn kind(&self) -> PlayerEventKind {
        match self {
            Self::SourceLoaded => PlayerEventKind::SourceLoaded,
            Self::SourceUnloaded => PlayerEventKind::SourceUnloaded,
            Self::Play => PlayerEventKind::Play,
            Self::Playing { .. } => PlayerEventKind::Playing,
            Self::Paused { .. } => PlayerEventKind::Paused,
            Self::TimeChanged { .. } => PlayerEventKind::TimeChanged,
            Self::Seek { .. } => PlayerEventKind::Seek,
            Self::Seeked => PlayerEventKind::Seeked,
            Self::StallStarted => PlayerEventKind::StallStarted,
            Self::StallEnded => PlayerEventKind::StallEnded,
            Self::Muted => PlayerEventKind::Muted,
            Self::Unmuted => PlayerEventKind::Unmuted,
            Self::PlaybackSpeedChanged { .. } => PlayerEventKind::PlaybackSpeedChanged,
            Self::Metadata(_) => PlayerEventKind::Metadata,
            Self::PlaybackFinished => PlayerEventKind::PlaybackFinished,
            Self::Error { .. } => PlayerEventKind::Error,
        }
    }
}

/// A media playback engine.
///
/// Load and unload are asynchronous; everything else is a plain call. Times
/// are absolute, ranges and buffer levels include stitched ad content.
#[async_trait]
pub trait PlaybackEngine: Send {
    async fn load(&mut self, source: &SourceConfig) -> Result<()>;
    async fn unload(&mut self) -> Result<()>;

    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Seek to an absolute time. Returns `false` if the engine refused.
    fn seek(&mut self, time: f64) -> bool;

    fn mute(&mut self);
    fn unmute(&mut self);
    fn is_muted(&self) -> bool;

    fn volume(&self) -> u8;
    fn set_volume(&mut self, volume: u8);

    fn playback_speed(&self) -> f64;
    fn set_playback_speed(&mut self, speed: f64);

    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn buffered_ranges(&self) -> Vec<TimeRange>;
    /// Seconds of media buffered ahead of the playhead.
    fn buffer_level(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn metadata_type_names() {
        assert_eq!(Metadata::Tag(TagPayload::Id3(Bytes::new())).type_name(), "ID3");
        assert_eq!(Metadata::Tag(TagPayload::Emsg(Bytes::new())).type_name(), "EMSG");
        assert_eq!(
            Metadata::DateRange(DateRangeSignal::default()).type_name(),
            "DATERANGE"
        );
    }

    #[test]
    fn event_kinds() {
        assert_eq!(PlayerEvent::Seeked.kind(), PlayerEventKind::Seeked);
        assert_eq!(
            PlayerEvent::TimeChanged { time: 1.0 }.kind(),
            PlayerEventKind::TimeChanged
        );
    }

    #[test]
    fn source_override() {
        let source = SourceConfig::new("https://example.com/master.m3u8", PlaybackMode::Vod)
            .with_immunity(AdImmunityConfig {
                duration: 30.0,
                ..Default::default()
            });
        assert_eq!(source.immunity.map(|i| i.duration), Some(30.0));
    }
}
