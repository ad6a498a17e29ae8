//! Time-domain mapping between the stitched timeline and content time.
//!
//! The engine plays one continuous *absolute* timeline with ad breaks
//! spliced in. Consumers see *content* time, where every active break has
//! zero length:
//!
//! ```text
//! absolute  0 ─────── 10 ▓▓▓▓ 15 ─────── 30 ▓▓▓▓▓▓▓▓ 40 ───── 45
//! content   0 ─────── 10        ──────── 25           ─────── 30
//! ```
//!
//! Each known break owns one [`StreamPart`]. Parts are sorted by start and
//! never overlap. Deactivating a break keeps its part but gives its time back
//! to the content timeline.
//!
//! Live and DVR-live streams use the identity mapping.

use adbridge_common::{PlaybackMode, TimeRange};

use crate::ads::{Ad, AdBreak};

/// Ranges shorter than this after mapping are dropped.
const MIN_RANGE: f64 = 1e-6;

/// Absolute interval occupied by one ad break.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPart {
    pub start: f64,
    pub end: f64,
    pub ad_break: AdBreak,
}

impl StreamPart {
    fn new(ad_break: AdBreak) -> Self {
        Self {
            start: ad_break.start,
            end: ad_break.end(),
            ad_break,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ad_break.active
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// The authoritative list of stream parts for one load.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    mode: PlaybackMode,
    parts: Vec<StreamPart>,
}

impl Timeline {
    /// Build a timeline from the session's breaks. Breaks overlapping an
    /// earlier one are discarded.
    pub fn new(mode: PlaybackMode, mut breaks: Vec<AdBreak>) -> Self {
        breaks.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut parts: Vec<StreamPart> = Vec::with_capacity(breaks.len());
        for ad_break in breaks {
            if let Some(previous) = parts.last() {
                if ad_break.start < previous.end {
                    tracing::warn!(
                        break_id = %ad_break.label(),
                        start = ad_break.start,
                        previous_end = previous.end,
                        "Discarding ad break overlapping an earlier break"
                    );
                    continue;
                }
            }
            parts.push(StreamPart::new(ad_break));
        }

        let mut timeline = Self { mode, parts };
        timeline.reschedule();
        timeline
    }

    pub fn empty(mode: PlaybackMode) -> Self {
        Self::new(mode, Vec::new())
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn parts(&self) -> &[StreamPart] {
        &self.parts
    }

    /// Snapshot of every known break, with current schedule times.
    pub fn ad_breaks(&self) -> Vec<AdBreak> {
        self.parts.iter().map(|p| p.ad_break.clone()).collect()
    }

    fn maps(&self) -> bool {
        self.mode == PlaybackMode::Vod
    }

    fn active_parts(&self) -> impl Iterator<Item = &StreamPart> {
        self.parts.iter().filter(|p| p.is_active())
    }

    /// Recompute every break's content-time schedule.
    fn reschedule(&mut self) {
        let maps = self.maps();
        let mut removed = 0.0;
        for part in &mut self.parts {
            part.ad_break.schedule_time = if maps {
                part.start - removed
            } else {
                part.start
            };
            if part.is_active() {
                removed += part.duration();
            }
        }
    }

    /// Map an absolute time to content time. Inside an active break the
    /// result is the break's schedule time.
    pub fn to_content_time(&self, absolute: f64) -> f64 {
        if !self.maps() {
            return absolute;
        }
        let mut removed = 0.0;
        for part in self.active_parts() {
            if absolute <= part.start {
                break;
            }
            removed += (absolute - part.start).min(part.duration());
        }
        absolute - removed
    }

    /// Map a content time to absolute time. A content time equal to a
    /// break's schedule time maps to the start of that break.
    pub fn to_absolute_time(&self, content: f64) -> f64 {
        if !self.maps() {
            return content;
        }
        let mut absolute = content;
        for part in self.active_parts() {
            if part.ad_break.schedule_time < content {
                absolute += part.duration();
            } else {
                break;
            }
        }
        absolute
    }

    /// The part covering `absolute`, active or not.
    pub fn part_at(&self, absolute: f64) -> Option<&StreamPart> {
        self.parts.iter().find(|p| p.range().contains(absolute))
    }

    /// The part starting exactly at `start`.
    pub fn part_starting_at(&self, start: f64) -> Option<&StreamPart> {
        self.parts
            .iter()
            .find(|p| (p.start - start).abs() < MIN_RANGE)
    }

    /// First active part whose start lies strictly between `after` and
    /// `before` (absolute).
    pub fn next_active_between(&self, after: f64, before: f64) -> Option<&StreamPart> {
        self.active_parts()
            .find(|p| p.start > after && p.start < before)
    }

    /// Permanently deactivate the break starting at `start`. Returns `false`
    /// if no such active break exists.
    pub fn deactivate(&mut self, start: f64) -> bool {
        let Some(part) = self
            .parts
            .iter_mut()
            .find(|p| p.is_active() && (p.start - start).abs() < MIN_RANGE)
        else {
            return false;
        };
        part.ad_break.active = false;
        tracing::debug!(break_id = %part.ad_break.label(), "Ad break deactivated");
        self.reschedule();
        true
    }

    /// Content duration of an asset whose absolute duration is given.
    pub fn content_duration(&self, absolute_duration: f64) -> f64 {
        if !self.maps() {
            return absolute_duration;
        }
        let ads: f64 = self.active_parts().map(StreamPart::duration).sum();
        (absolute_duration - ads).max(0.0)
    }

    /// Map buffered absolute ranges to content ranges. Each range is split
    /// around active breaks; empty pieces are dropped.
    pub fn buffered_ranges(&self, ranges: &[TimeRange]) -> Vec<TimeRange> {
        if !self.maps() {
            return ranges.to_vec();
        }

        let mut mapped = Vec::new();
        for range in ranges {
            let mut cursor = range.start;
            let mut pieces = Vec::new();
            for part in self.active_parts() {
                if part.end <= cursor || part.start >= range.end {
                    continue;
                }
                if part.start > cursor {
                    pieces.push(TimeRange::new(cursor, part.start));
                }
                cursor = cursor.max(part.end);
            }
            if cursor < range.end {
                pieces.push(TimeRange::new(cursor, range.end));
            }

            mapped.extend(
                pieces
                    .into_iter()
                    .map(|p| {
                        TimeRange::new(self.to_content_time(p.start), self.to_content_time(p.end))
                    })
                    .filter(|p| p.duration() > MIN_RANGE),
            );
        }
        mapped
    }

    /// Seconds of content buffered ahead of `current` (absolute).
    ///
    /// While an ad plays the level is capped at what is left of that ad.
    /// Otherwise future active breaks inside the buffered window are not
    /// counted.
    pub fn buffer_level(&self, current: f64, level: f64, active_ad: Option<&Ad>) -> f64 {
        if let Some(ad) = active_ad {
            return level.min((ad.end() - current).max(0.0));
        }
        if !self.maps() {
            return level;
        }
        let window = TimeRange::new(current, current + level);
        let ads: f64 = self
            .active_parts()
            .map(|p| window.overlap(&p.range()))
            .sum();
        (level - ads).max(0.0)
    }
}
