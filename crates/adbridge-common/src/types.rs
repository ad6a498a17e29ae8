//! Core type definitions for playback modes, ad breaks and time ranges.
//!
//! All enums are serialized in lowercase (snake_case for multi-word variants)
//! so they can be carried in consumer-facing events unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// How the loaded stream is played back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Video on demand: ads are hidden from the content timeline.
    #[default]
    Vod,
    /// Live stream without a seek window.
    Live,
    /// Live stream with a DVR seek window.
    DvrLive,
}

impl PlaybackMode {
    /// Whether this mode plays a live stream.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live | Self::DvrLive)
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vod => write!(f, "vod"),
            Self::Live => write!(f, "live"),
            Self::DvrLive => write!(f, "dvr_live"),
        }
    }
}

impl FromStr for PlaybackMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vod" => Ok(Self::Vod),
            "live" => Ok(Self::Live),
            "dvr_live" | "dvrlive" | "dvr-live" => Ok(Self::DvrLive),
            other => Err(Error::invalid_input(format!("unknown playback mode '{other}'"))),
        }
    }
}

/// Where an ad break sits relative to the content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdBreakPosition {
    /// Before any content.
    Preroll,
    /// Inside the content.
    Midroll,
    /// After all content.
    Postroll,
    /// Not reported by the ad session.
    #[default]
    Unknown,
}

impl fmt::Display for AdBreakPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preroll => write!(f, "preroll"),
            Self::Midroll => write!(f, "midroll"),
            Self::Postroll => write!(f, "postroll"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Quartile progress markers surfaced while an ad plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quartile {
    /// 25% of the ad has played.
    FirstQuartile,
    /// 50% of the ad has played.
    Midpoint,
    /// 75% of the ad has played.
    ThirdQuartile,
}

impl fmt::Display for Quartile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstQuartile => write!(f, "first_quartile"),
            Self::Midpoint => write!(f, "midpoint"),
            Self::ThirdQuartile => write!(f, "third_quartile"),
        }
    }
}

/// A half-open time interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range.
    pub start: f64,
    /// End of the range.
    pub end: f64,
}

impl TimeRange {
    /// Create a new range.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length of the range, never negative.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Whether the range has no length.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `time` lies inside `[start, end)`.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    /// Length of the overlap between two ranges.
    pub fn overlap(&self, other: &TimeRange) -> f64 {
        (self.end.min(other.end) - self.start.max(other.start)).max(0.0)
    }
}
