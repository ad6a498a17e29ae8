//! Policy-guarded consumer controls.

use crate::engine::PlayerEventKind;
use crate::error::PolicyErrorCode;
use crate::events::BridgeEvent;
use crate::policy::PolicyContext;

use super::Bridge;

/// Skipping to within this many seconds of the asset end counts as the end.
const END_OF_STREAM_TOLERANCE: f64 = 0.001;

impl Bridge {
    fn policy_context(&self) -> PolicyContext {
        self.lifecycle.policy_context(self.engine.current_time())
    }

    fn deny(&self, code: PolicyErrorCode) {
        tracing::debug!(?code, "Policy denied action");
        self.emit(BridgeEvent::policy_error(code));
    }

    pub fn play(&mut self) {
        self.engine.play();
    }

    pub fn pause(&mut self) {
        if !self.policy.can_pause(&self.policy_context()) {
            return self.deny(PolicyErrorCode::PauseNotAllowed);
        }
        self.engine.pause();
    }

    pub fn mute(&mut self) {
        if !self.policy.can_mute(&self.policy_context()) {
            return self.deny(PolicyErrorCode::MuteNotAllowed);
        }
        self.engine.mute();
    }

    pub fn unmute(&mut self) {
        if !self.policy.can_mute(&self.policy_context()) {
            return self.deny(PolicyErrorCode::MuteNotAllowed);
        }
        self.engine.unmute();
    }

    pub fn set_playback_speed(&mut self, speed: f64) {
        if !self.policy.can_change_playback_speed(&self.policy_context()) {
            return self.deny(PolicyErrorCode::PlaybackSpeedNotAllowed);
        }
        self.lifecycle.set_user_speed(speed);
        self.engine.set_playback_speed(speed);
    }

    /// Seek to a content time.
    ///
    /// A redirected seek lands on the break the policy chose and the
    /// original target is replayed once that break finishes. Returns `false`
    /// when seeking is not allowed at all.
    pub fn seek(&mut self, target: f64) -> bool {
        let ctx = self.policy_context();
        if !self.policy.can_seek(&ctx) {
            self.deny(PolicyErrorCode::SeekNotAllowed);
            return false;
        }

        let allowed = self.policy.can_seek_to(target, &ctx);
        if allowed != target {
            self.deny(PolicyErrorCode::SeekToNotAllowed);
            self.lifecycle.cache_seek(target);
            tracing::debug!(target, redirect = allowed, "Seek redirected by policy");
        }

        self.finished = false;
        let absolute = self.lifecycle.to_absolute(allowed);
        tracing::debug!(content = allowed, absolute, "Seeking");
        self.engine.seek(absolute)
    }

    /// Skip the active ad if the policy allows it now.
    ///
    /// Skipping the last ad of the asset does not seek into the end of the
    /// stream. Playback is paused just before the final break and
    /// [`BridgeEvent::PlaybackFinished`] is emitted instead.
    pub fn skip_ad(&mut self) -> bool {
        let ctx = self.policy_context();
        if !matches!(self.policy.can_skip(&ctx), Some(wait) if wait <= 0.0) {
            self.deny(PolicyErrorCode::SkipNotAllowed);
            return false;
        }
        let Some(ad) = ctx.active_ad else {
            return false;
        };

        self.lifecycle.skip_current_ad();
        let target = ad.end();

        if target >= self.engine.duration() - END_OF_STREAM_TOLERANCE {
            let break_start = ctx.active_break.map_or(ad.start, |b| b.start);
            tracing::info!(ad_id = %ad.id, break_start, "Skipped final ad, faking end of stream");

            self.finished = true;
            if !self.engine.is_paused() {
                self.suppressed.suppress(&[PlayerEventKind::Paused]);
            }
            self.engine.pause();
            let park = (break_start - self.config.end_of_stream_backoff).max(0.0);
            self.internal_seek(park);
            self.emit(BridgeEvent::PlaybackFinished);
        } else {
            tracing::debug!(ad_id = %ad.id, target, "Skipping ad");
            self.internal_seek(target);
            self.emit(BridgeEvent::AdSkipped { ad });
        }
        true
    }

    /// Report a click on the active ad.
    pub fn ad_clicked(&mut self) {
        if let Some(ad) = self.lifecycle.report_click() {
            self.emit(BridgeEvent::AdClicked {
                ad_id: ad.id,
                click_through_url: ad.click_through_url,
            });
        }
    }
}
