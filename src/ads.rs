//! Ad and ad-break snapshots.
//!
//! These are immutable views of what the ad session knows. The only mutable
//! bit is [`AdBreak::active`], owned by the timeline and flipped when a break
//! is passed during ad immunity.

use adbridge_common::{AdBreakPosition, TimeRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Companion creative displayed alongside a linear ad.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompanionAd {
    pub id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub resource_url: Option<String>,
    pub click_through_url: Option<String>,
}

/// Vendor and creative attribution carried in ad extensions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdExtensions {
    pub advertiser: Option<String>,
    pub creative_id: Option<String>,
    /// Any other extension key/value pairs.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// A single ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    /// Duration in seconds.
    pub duration: f64,
    /// Start on the absolute (stitched) timeline.
    pub start: f64,
    /// Seconds into the ad after which it may be skipped; `None` when the ad
    /// is not skippable.
    pub skip_offset: Option<f64>,
    /// 1-based position inside the owning break.
    pub sequence: u32,
    #[serde(default)]
    pub companions: Vec<CompanionAd>,
    pub click_through_url: Option<String>,
    pub is_linear: bool,
    #[serde(default)]
    pub extensions: AdExtensions,
}

impl Ad {
    /// Absolute end time.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Time elapsed since the ad began, clamped to the ad's duration.
    pub fn elapsed(&self, absolute: f64) -> f64 {
        (absolute - self.start).clamp(0.0, self.duration)
    }

    /// Seconds left until the ad becomes skippable at `absolute`, or `None`
    /// when it never does.
    pub fn seconds_until_skippable(&self, absolute: f64) -> Option<f64> {
        let offset = self.skip_offset?;
        Some((offset - self.elapsed(absolute)).max(0.0))
    }
}

/// A scheduled group of ads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdBreak {
    pub id: Option<String>,
    /// Start on the absolute timeline.
    pub start: f64,
    /// Start on the content timeline. Kept current by the timeline.
    pub schedule_time: f64,
    pub duration: f64,
    pub position: AdBreakPosition,
    pub ads: Vec<Ad>,
    /// Inactive breaks are permanently skippable.
    pub active: bool,
}

impl AdBreak {
    /// Create an active break at an absolute start. The schedule time is
    /// filled in once the break joins a timeline.
    pub fn new(start: f64, duration: f64, position: AdBreakPosition) -> Self {
        Self {
            id: None,
            start,
            schedule_time: start,
            duration,
            position,
            ads: Vec::new(),
            active: true,
        }
    }

    /// Absolute end time.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Absolute interval covered by the break.
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end())
    }

    /// Whether the break would be shown in an ad list.
    pub fn is_listable(&self) -> bool {
        self.active && self.duration > 0.0
    }

    /// The ad playing at `absolute`, if any.
    pub fn ad_at(&self, absolute: f64) -> Option<&Ad> {
        self.ads
            .iter()
            .find(|ad| absolute >= ad.start && absolute < ad.end())
    }

    /// Label used in logs when the break has no identifier.
    pub fn label(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("break@{:.3}", self.start))
    }
}
