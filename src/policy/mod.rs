//! Pluggable rules for consumer playback actions.
//!
//! The bridge asks its [`AdPolicy`] before every seek, skip, mute, pause and
//! speed change. A refusal is reported as a policy error event and the
//! action is not performed.

use adbridge_common::PlaybackMode;

use crate::ads::{Ad, AdBreak};

/// Read-only view of the playback state handed to a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyContext {
    pub mode: PlaybackMode,
    /// Engine playhead on the absolute timeline.
    pub absolute_time: f64,
    /// Playhead on the content timeline.
    pub content_time: f64,
    pub active_ad: Option<Ad>,
    pub active_break: Option<AdBreak>,
    /// Every known break with current schedule times.
    pub ad_breaks: Vec<AdBreak>,
    pub ad_immunity_active: bool,
}

/// Decides which consumer actions are allowed.
pub trait AdPolicy: Send {
    fn can_seek(&self, ctx: &PolicyContext) -> bool;

    /// Return the content time playback may actually seek to. Returning
    /// anything other than `target` redirects the seek.
    fn can_seek_to(&self, target: f64, ctx: &PolicyContext) -> f64;

    /// Seconds until the active ad may be skipped, `Some(0.0)` when it may be
    /// skipped now, `None` when it cannot be skipped at all.
    fn can_skip(&self, ctx: &PolicyContext) -> Option<f64>;

    fn can_mute(&self, ctx: &PolicyContext) -> bool;
    fn can_pause(&self, ctx: &PolicyContext) -> bool;
    fn can_change_playback_speed(&self, ctx: &PolicyContext) -> bool;
}

/// Rules used unless the consumer installs its own policy.
///
/// Seeking is blocked while an ad plays, forward seeks over a listed break
/// land on the last skipped-over break, and ads become skippable once their
/// skip offset has passed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl AdPolicy for DefaultPolicy {
    fn can_seek(&self, ctx: &PolicyContext) -> bool {
        ctx.active_ad.is_none()
    }

    fn can_seek_to(&self, target: f64, ctx: &PolicyContext) -> f64 {
        if ctx.ad_immunity_active || target <= ctx.content_time {
            return target;
        }
        ctx.ad_breaks
            .iter()
            .filter(|b| b.is_listable())
            .filter(|b| b.schedule_time > ctx.content_time && b.schedule_time < target)
            .map(|b| b.schedule_time)
            .last()
            .unwrap_or(target)
    }

    fn can_skip(&self, ctx: &PolicyContext) -> Option<f64> {
        if ctx.mode.is_live() {
            return None;
        }
        let ad = ctx.active_ad.as_ref().filter(|ad| ad.is_linear)?;
        ad.seconds_until_skippable(ctx.absolute_time)
    }

    fn can_mute(&self, _ctx: &PolicyContext) -> bool {
        true
    }

    fn can_pause(&self, _ctx: &PolicyContext) -> bool {
        true
    }

    fn can_change_playback_speed(&self, ctx: &PolicyContext) -> bool {
        ctx.active_ad.is_none()
    }
}
