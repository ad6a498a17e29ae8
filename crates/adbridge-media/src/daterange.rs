//! Synthetic markers for date-range signaling.
//!
//! Some platforms only report ad placements as intervals (an HLS
//! `EXT-X-DATERANGE` with a start, an end and an id) instead of per-marker
//! tags. The [`MetadataSynthesizer`] expands each interval into the marker
//! sequence an ad session expects to see in-band:
//!
//! ```text
//! start+0.1   start+2.1   start+4.1   ...   end-0.1
//!     S           M           M                E
//! ```
//!
//! Markers are held in ascending time order and released by
//! [`MetadataSynthesizer::due`] once playback passes them.

use std::collections::{BTreeMap, HashMap};

use crate::record::{MarkerKind, TagRecord, KEY_DURATION, KEY_MEDIA_ID, KEY_SEQUENCE};

const DEFAULT_SEQUENCE: &str = "1:1";

/// Timing used when expanding a range into markers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct SynthesizerConfig {
    /// Delay of the start marker after the range begins.
    pub start_offset: f64,
    /// Spacing of mid markers.
    pub mid_interval: f64,
    /// Lead of the end marker before the range ends.
    pub end_offset: f64,
    /// A range whose start is within this many seconds of an already
    /// processed start for the same id is a duplicate.
    pub dedup_window: f64,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            start_offset: 0.1,
            mid_interval: 2.0,
            end_offset: 0.1,
            dedup_window: 10.0,
        }
    }
}

/// One interval signal.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DateRangeSignal {
    /// Range identifier.
    pub id: String,
    /// Start on the playback timeline, in seconds.
    pub start: f64,
    /// Explicit end, if signaled.
    pub end: Option<f64>,
    /// Duration, if signaled.
    pub duration: Option<f64>,
    /// Client attributes (`X-...`) carried with the range.
    pub attributes: BTreeMap<String, String>,
}

impl DateRangeSignal {
    /// End of the range from `end`, or `start + duration`.
    pub fn end_time(&self) -> Option<f64> {
        self.end
            .or_else(|| self.duration.map(|d| self.start + d))
            .filter(|end| *end > self.start)
    }

    fn attribute(&self, suffix: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.to_ascii_uppercase().ends_with(suffix))
            .map(|(_, v)| v.as_str())
    }
}

/// A marker scheduled on the playback timeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SyntheticMarker {
    /// Playback time at which the marker becomes due.
    pub time: f64,
    pub record: TagRecord,
}

/// Expands date ranges into scheduled markers.
#[derive(Debug, Default)]
pub struct MetadataSynthesizer {
    config: SynthesizerConfig,
    queue: Vec<SyntheticMarker>,
    processed: HashMap<String, f64>,
}

impl MetadataSynthesizer {
    /// Create a synthesizer with the given timing.
    pub fn new(config: SynthesizerConfig) -> Self {
        Self {
            config,
            queue: Vec::new(),
            processed: HashMap::new(),
        }
    }

    /// Queue the markers for one range. Returns how many were queued; zero
    /// for duplicates and ranges without a usable end.
    pub fn ingest(&mut self, signal: &DateRangeSignal) -> usize {
        if let Some(previous) = self.processed.get(&signal.id) {
            if (signal.start - previous).abs() < self.config.dedup_window {
                tracing::debug!(id = %signal.id, start = signal.start, "Duplicate date range suppressed");
                return 0;
            }
        }

        let Some(end) = signal.end_time() else {
            tracing::debug!(id = %signal.id, "Date range without end ignored");
            return 0;
        };
        self.processed.insert(signal.id.clone(), signal.start);

        let media_id = signal
            .attribute(KEY_MEDIA_ID)
            .unwrap_or(signal.id.as_str())
            .to_string();
        let sequence = signal
            .attribute(KEY_SEQUENCE)
            .unwrap_or(DEFAULT_SEQUENCE)
            .to_string();
        let duration = signal
            .attribute(KEY_DURATION)
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(end - signal.start);

        let marker = |time: f64, kind: MarkerKind| SyntheticMarker {
            time,
            record: TagRecord {
                media_id: media_id.clone(),
                sequence: sequence.clone(),
                kind,
                duration,
            },
        };

        let first = signal.start + self.config.start_offset;
        let last = end - self.config.end_offset;
        let mut markers = vec![marker(first, MarkerKind::Start)];

        if self.config.mid_interval > 0.0 {
            let mut time = first + self.config.mid_interval;
            while time < last {
                markers.push(marker(time, MarkerKind::Mid));
                time += self.config.mid_interval;
            }
        }
        if last > first {
            markers.push(marker(last, MarkerKind::End));
        }

        let count = markers.len();
        self.queue.extend(markers);
        self.queue.sort_by(|a, b| a.time.total_cmp(&b.time));

        tracing::debug!(id = %signal.id, start = signal.start, end, count, "Date range expanded");
        count
    }

    /// Remove and return every marker due at or before `time`.
    pub fn due(&mut self, time: f64) -> Vec<SyntheticMarker> {
        let n = self.queue.partition_point(|m| m.time <= time);
        self.queue.drain(..n).collect()
    }

    /// Markers still waiting, in ascending time order.
    pub fn pending(&self) -> &[SyntheticMarker] {
        &self.queue
    }

    /// Forget all queued markers and processed ranges.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.processed.clear();
    }
}
