//! Ad lifecycle state machine.
//!
//! Owns the live [`AdSession`] and everything derived from it for one load:
//! the [`Timeline`], the current break and ad, the immunity window and the
//! cached seek target. Session callbacks arrive over the [`SessionBus`] and
//! are translated into consumer events.
//!
//! ```text
//! Idle ─▶ Loading ─▶ Initialized ─▶ SteadyState ⇄ AdBreakActive ⇄ AdActive
//!            │                            │
//!            └──────── (failure) ─────────┴──▶ TornDown
//! ```
//!
//! The state machine never touches the engine. Anything the engine has to
//! do is returned as an [`Action`] for the bridge to carry out.

pub mod immunity;

use adbridge_common::{PlaybackMode, SessionId};

use crate::ads::{Ad, AdBreak};
use crate::config::AdImmunityConfig;
use crate::engine::SourceConfig;
use crate::error::{Error, Result, SessionErrorCode};
use crate::events::BridgeEvent;
use crate::policy::PolicyContext;
use crate::session::bus::SessionBus;
use crate::session::{AdSession, PlayerSignal, SessionEvent, SessionInit, SessionReady};
use crate::timeline::Timeline;

pub use immunity::AdImmunity;

const NORMAL_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Loading,
    Initialized,
    SteadyState,
    AdBreakActive,
    AdActive,
    TornDown,
}

/// Work the bridge performs on behalf of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Emit(BridgeEvent),
    /// Seek the engine to an absolute time without surfacing the seek.
    Seek(f64),
    SetSpeed(f64),
    /// Re-issue a consumer seek to a content time.
    ReplaySeek(f64),
}

/// A break being jumped over; its session callbacks are swallowed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SkippedBreak {
    start: f64,
    end: f64,
}

/// A session that has not resolved yet. Shut down if dropped unresolved.
struct PendingSession {
    session: Option<Box<dyn AdSession>>,
}

impl PendingSession {
    fn new(session: Box<dyn AdSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    async fn initialize(
        &mut self,
        init: SessionInit,
    ) -> std::result::Result<SessionReady, SessionErrorCode> {
        match self.session.as_mut() {
            Some(session) => session.initialize(init).await,
            None => Err(SessionErrorCode::NotInitialized),
        }
    }

    fn release(mut self) -> Option<Box<dyn AdSession>> {
        self.session.take()
    }
}

impl Drop for PendingSession {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            tracing::warn!("Ad session dropped before it resolved");
            session.shutdown();
        }
    }
}

pub struct AdLifecycle {
    state: LifecycleState,
    session: Option<Box<dyn AdSession>>,
    session_id: Option<SessionId>,
    bus: SessionBus,
    timeline: Timeline,
    immunity: AdImmunity,
    rewind_tolerance: f64,
    active_break: Option<AdBreak>,
    active_ad: Option<Ad>,
    cached_seek: Option<f64>,
    user_speed: f64,
    first_play_sent: bool,
    last_time: Option<f64>,
    skipping: Option<SkippedBreak>,
}

impl AdLifecycle {
    pub fn new(immunity: AdImmunityConfig, rewind_tolerance: f64) -> Self {
        Self {
            state: LifecycleState::Idle,
            session: None,
            session_id: None,
            bus: SessionBus::new(),
            timeline: Timeline::default(),
            immunity: AdImmunity::new(immunity),
            rewind_tolerance,
            active_break: None,
            active_ad: None,
            cached_seek: None,
            user_speed: NORMAL_SPEED,
            first_play_sent: false,
            last_time: None,
            skipping: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn mode(&self) -> PlaybackMode {
        self.timeline.mode()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn active_ad(&self) -> Option<&Ad> {
        self.active_ad.as_ref()
    }

    pub fn active_break(&self) -> Option<&AdBreak> {
        self.active_break.as_ref()
    }

    pub fn cached_seek(&self) -> Option<f64> {
        self.cached_seek
    }

    pub fn immunity_config(&self) -> AdImmunityConfig {
        self.immunity.config()
    }

    pub fn is_immunity_active(&self) -> bool {
        self.immunity.is_active()
    }

    pub fn user_speed(&self) -> f64 {
        self.user_speed
    }

    fn is_vod(&self) -> bool {
        self.mode() == PlaybackMode::Vod
    }

    // -----------------------------------------------------------------------
    // Load / teardown
    // -----------------------------------------------------------------------

    /// Tear down any previous session, then create and resolve a new one.
    ///
    /// Dropping the returned future before it resolves shuts the pending
    /// session down. The lifecycle notices the abandoned load on the next
    /// [`AdLifecycle::drain`] and discards whatever the session pushed.
    pub async fn load(
        &mut self,
        session: Box<dyn AdSession>,
        source: &SourceConfig,
        immunity: AdImmunityConfig,
    ) -> Result<SessionReady> {
        self.teardown();

        let session_id = SessionId::new();
        self.session_id = Some(session_id);
        self.immunity = AdImmunity::new(immunity);
        self.timeline = Timeline::empty(source.mode);
        self.state = LifecycleState::Loading;

        tracing::info!(
            session_id = %session_id,
            url = %source.url,
            mode = %source.mode,
            "Initializing ad session"
        );

        let init = SessionInit {
            session_id,
            url: source.url.clone(),
            mode: source.mode,
            events: self.bus.sender(session_id),
        };
        let mut pending = PendingSession::new(session);
        let result = pending.initialize(init).await;
        let Some(mut session) = pending.release() else {
            return Err(Error::Session(SessionErrorCode::NotInitialized));
        };

        match result {
            Ok(ready) => {
                let mode = session.mode();
                self.timeline = Timeline::new(mode, session.ad_breaks());
                self.session = Some(session);
                self.state = LifecycleState::Initialized;
                tracing::info!(
                    session_id = %session_id,
                    mode = %mode,
                    breaks = self.timeline.parts().len(),
                    "Ad session initialized"
                );
                Ok(ready)
            }
            Err(code) => {
                tracing::warn!(session_id = %session_id, error = %code, "Ad session failed to initialize");
                session.shutdown();
                self.reset();
                self.state = LifecycleState::TornDown;
                Err(Error::Session(code))
            }
        }
    }

    /// Clean up after a load whose future was dropped mid-resolution.
    ///
    /// `load` holds `&mut self` until it returns, so `Loading` is only ever
    /// observed here when that future is gone.
    fn abandon_cancelled_load(&mut self) {
        if self.state != LifecycleState::Loading {
            return;
        }
        tracing::warn!(session_id = ?self.session_id, "Discarding cancelled ad session load");
        self.reset();
        self.state = LifecycleState::TornDown;
    }

    /// Shut the session down. An ad still playing is skipped first so its
    /// skip tracking fires.
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if self.active_ad.is_some() {
                session.skip_current_ad();
            }
            session.shutdown();
            tracing::info!(
                session_id = ?self.session_id,
                "Ad session torn down"
            );
        }
        if self.state != LifecycleState::Idle {
            self.state = LifecycleState::TornDown;
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.session_id = None;
        self.timeline = Timeline::empty(self.timeline.mode());
        self.immunity = AdImmunity::new(self.immunity.config());
        self.active_break = None;
        self.active_ad = None;
        self.cached_seek = None;
        self.first_play_sent = false;
        self.last_time = None;
        self.skipping = None;
    }

    // -----------------------------------------------------------------------
    // Player-driven transitions
    // -----------------------------------------------------------------------

    pub fn on_source_loaded(&mut self) {
        if self.state == LifecycleState::Initialized {
            self.state = LifecycleState::SteadyState;
        }
    }

    pub fn on_playing(&mut self) {
        let signal = if self.first_play_sent {
            PlayerSignal::Resumed
        } else {
            self.first_play_sent = true;
            PlayerSignal::PlaybackStarted
        };
        self.signal(signal);
    }

    /// Handle a playhead update. Returns `None` when the update is rewind
    /// jitter that must not reach the consumer.
    pub fn on_time_changed(&mut self, absolute: f64) -> Option<Vec<Action>> {
        if let Some(last) = self.last_time {
            if absolute < last && last - absolute < self.rewind_tolerance {
                tracing::debug!(absolute, last, "Suppressing spurious rewind");
                return None;
            }
        }

        let mut actions = Vec::new();
        if self.immunity.poll_expired() {
            tracing::info!(session_id = ?self.session_id, "Ad immunity ended");
            actions.push(Action::Emit(BridgeEvent::AdImmunityEnded));
        }

        if self.skipping.is_some_and(|s| absolute >= s.end) {
            self.skipping = None;
        }

        let mut resume_at = absolute;
        if self.is_vod() && self.immunity.is_active() && self.active_break.is_none() {
            let last = self.last_time.unwrap_or(absolute);
            let look_ahead = absolute + self.immunity.config().ad_break_check_offset;
            if let Some(part) = self.timeline.next_active_between(last, look_ahead) {
                let (start, end) = (part.start, part.end);
                actions.extend(self.skip_break(start, end));
                resume_at = end;
            }
        }

        self.last_time = Some(resume_at);
        self.signal(PlayerSignal::Playhead(absolute));
        Some(actions)
    }

    pub fn on_seeked(&mut self, absolute: f64) {
        self.last_time = Some(absolute);
        self.signal(PlayerSignal::Seeked(absolute));
    }

    /// Forward player state to the session, if one is live.
    pub fn signal(&mut self, signal: PlayerSignal) {
        if let Some(session) = self.session.as_mut() {
            session.on_player_signal(signal);
        }
    }

    // -----------------------------------------------------------------------
    // Session callbacks
    // -----------------------------------------------------------------------

    /// Process every queued session callback and a lapsed immunity window.
    pub fn drain(&mut self) -> Vec<Action> {
        self.abandon_cancelled_load();

        let mut actions = Vec::new();
        if self.immunity.poll_expired() {
            tracing::info!(session_id = ?self.session_id, "Ad immunity ended");
            actions.push(Action::Emit(BridgeEvent::AdImmunityEnded));
        }
        let current = self.session.as_ref().and(self.session_id);
        for event in self.bus.drain(current) {
            actions.extend(self.handle_session_event(event));
        }
        actions
    }

    fn handle_session_event(&mut self, event: SessionEvent) -> Vec<Action> {
        match event {
            SessionEvent::AdBreakStarted(ad_break) => self.on_ad_break_started(ad_break),
            SessionEvent::AdStarted(ad) => self.on_ad_started(ad),
            SessionEvent::AdFinished => self.on_ad_finished(),
            SessionEvent::AdBreakFinished => self.on_ad_break_finished(),
            SessionEvent::Tracking(tracking) => {
                if self.skipping.is_some() {
                    return Vec::new();
                }
                match (tracking.quartile(), self.active_ad.as_ref()) {
                    (Some(quartile), Some(ad)) => vec![Action::Emit(BridgeEvent::AdQuartile {
                        ad_id: ad.id.clone(),
                        quartile,
                    })],
                    _ => {
                        tracing::trace!(?tracking, "Tracking event not surfaced");
                        Vec::new()
                    }
                }
            }
            SessionEvent::AnalyticsUpdated(breaks) => {
                self.on_analytics_updated(breaks);
                Vec::new()
            }
        }
    }

    fn on_ad_break_started(&mut self, mut ad_break: AdBreak) -> Vec<Action> {
        if self
            .skipping
            .is_some_and(|s| (s.start - ad_break.start).abs() < f64::EPSILON)
        {
            return Vec::new();
        }

        let part = self.timeline.part_starting_at(ad_break.start);
        let inactive = part.is_some_and(|p| !p.is_active());
        let end = part.map(|p| p.end).unwrap_or_else(|| ad_break.end());
        if let Some(part) = part {
            ad_break.schedule_time = part.ad_break.schedule_time;
            ad_break.active = part.is_active();
        }

        if self.is_vod() && (inactive || self.immunity.is_active()) {
            self.last_time = Some(end);
            return self.skip_break(ad_break.start, end);
        }

        tracing::info!(
            session_id = ?self.session_id,
            break_id = %ad_break.label(),
            start = ad_break.start,
            duration = ad_break.duration,
            "Ad break started"
        );
        self.state = LifecycleState::AdBreakActive;
        self.active_break = Some(ad_break.clone());

        let mut actions = Vec::new();
        if self.user_speed != NORMAL_SPEED {
            actions.push(Action::SetSpeed(NORMAL_SPEED));
        }
        actions.push(Action::Emit(BridgeEvent::AdBreakStarted { ad_break }));
        actions
    }

    fn on_ad_started(&mut self, ad: Ad) -> Vec<Action> {
        if self.skipping.is_some() {
            return Vec::new();
        }
        tracing::debug!(ad_id = %ad.id, start = ad.start, duration = ad.duration, "Ad started");
        self.state = LifecycleState::AdActive;
        self.active_ad = Some(ad.clone());
        vec![Action::Emit(BridgeEvent::AdStarted { ad })]
    }

    fn on_ad_finished(&mut self) -> Vec<Action> {
        if self.skipping.is_some() {
            return Vec::new();
        }
        let Some(ad) = self.active_ad.take() else {
            tracing::debug!("Ad end without an active ad");
            return Vec::new();
        };
        tracing::debug!(ad_id = %ad.id, "Ad finished");
        self.state = if self.active_break.is_some() {
            LifecycleState::AdBreakActive
        } else {
            LifecycleState::SteadyState
        };
        vec![Action::Emit(BridgeEvent::AdFinished { ad })]
    }

    fn on_ad_break_finished(&mut self) -> Vec<Action> {
        let Some(ad_break) = self.active_break.take() else {
            if self.skipping.take().is_none() {
                tracing::debug!("Ad break end without an active break");
            }
            return Vec::new();
        };
        self.active_ad = None;
        self.state = LifecycleState::SteadyState;

        tracing::info!(
            session_id = ?self.session_id,
            break_id = %ad_break.label(),
            "Ad break finished"
        );

        let mut actions = vec![Action::Emit(BridgeEvent::AdBreakFinished { ad_break })];

        if self.is_vod() && self.immunity.start() {
            let duration = self.immunity.config().duration;
            tracing::info!(session_id = ?self.session_id, duration, "Ad immunity started");
            actions.push(Action::Emit(BridgeEvent::AdImmunityStarted { duration }));
        }
        if let Some(target) = self.cached_seek.take() {
            tracing::debug!(target, "Replaying cached seek");
            actions.push(Action::ReplaySeek(target));
        }
        if self.user_speed != NORMAL_SPEED {
            actions.push(Action::SetSpeed(self.user_speed));
        }
        actions
    }

    fn on_analytics_updated(&mut self, mut breaks: Vec<AdBreak>) {
        for ad_break in &mut breaks {
            if self
                .timeline
                .part_starting_at(ad_break.start)
                .is_some_and(|p| !p.is_active())
            {
                ad_break.active = false;
            }
        }
        tracing::debug!(breaks = breaks.len(), "Ad break list updated");
        self.timeline = Timeline::new(self.mode(), breaks);
    }

    /// Jump over a break entered while immune (or already deactivated).
    fn skip_break(&mut self, start: f64, end: f64) -> Vec<Action> {
        if self.immunity.config().disable_passed_ad_breaks && self.timeline.deactivate(start) {
            if let Some(session) = self.session.as_mut() {
                session.deactivate_break(start);
            }
        }
        tracing::info!(
            session_id = ?self.session_id,
            start,
            end,
            remaining = ?self.immunity.remaining(),
            "Skipping ad break during ad immunity"
        );
        self.skipping = Some(SkippedBreak { start, end });
        vec![Action::Seek(end)]
    }

    // -----------------------------------------------------------------------
    // Consumer-driven operations
    // -----------------------------------------------------------------------

    /// Remember where the consumer wanted to go before a policy redirect.
    pub fn cache_seek(&mut self, target: f64) {
        self.cached_seek = Some(target);
    }

    pub fn set_user_speed(&mut self, speed: f64) {
        self.user_speed = speed;
    }

    pub fn set_immunity_config(&mut self, config: AdImmunityConfig) -> Vec<Action> {
        let mut actions = vec![Action::Emit(BridgeEvent::AdImmunityConfigured { config })];
        if self.immunity.configure(config) {
            actions.push(Action::Emit(BridgeEvent::AdImmunityEnded));
        }
        actions
    }

    /// Tell the session the current ad was skipped.
    pub fn skip_current_ad(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.skip_current_ad();
        }
    }

    /// Report a click on the current ad, returning it.
    pub fn report_click(&mut self) -> Option<Ad> {
        let ad = self.active_ad.clone()?;
        if let Some(session) = self.session.as_mut() {
            session.report_click();
        }
        Some(ad)
    }

    // -----------------------------------------------------------------------
    // Time views
    // -----------------------------------------------------------------------

    pub fn content_time(&self, absolute: f64) -> f64 {
        self.timeline.to_content_time(absolute)
    }

    pub fn to_absolute(&self, content: f64) -> f64 {
        self.timeline.to_absolute_time(content)
    }

    /// The time reported to consumers: ad-relative while a VOD ad plays,
    /// content time otherwise.
    pub fn current_time(&self, absolute: f64) -> f64 {
        match &self.active_ad {
            Some(ad) if self.is_vod() => (absolute - ad.start).max(0.0),
            _ => self.content_time(absolute),
        }
    }

    pub fn policy_context(&self, absolute: f64) -> PolicyContext {
        PolicyContext {
            mode: self.mode(),
            absolute_time: absolute,
            content_time: self.content_time(absolute),
            active_ad: self.active_ad.clone(),
            active_break: self.active_break.clone(),
            ad_breaks: self.timeline.ad_breaks(),
            ad_immunity_active: self.immunity.is_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEventSender;
    use adbridge_common::AdBreakPosition;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Shared {
        sender: Option<SessionEventSender>,
        shutdowns: usize,
        skips: usize,
    }

    struct StubSession {
        shared: Arc<Mutex<Shared>>,
        breaks: Vec<AdBreak>,
        fail: Option<SessionErrorCode>,
    }

    #[async_trait]
    impl AdSession for StubSession {
        async fn initialize(
            &mut self,
            init: SessionInit,
        ) -> std::result::Result<SessionReady, SessionErrorCode> {
            if let Some(code) = self.fail {
                return Err(code);
            }
            self.shared.lock().unwrap().sender = Some(init.events);
            Ok(SessionReady {
                playback_url: format!("{}?stitched", init.url),
            })
        }
        fn mode(&self) -> PlaybackMode {
            PlaybackMode::Vod
        }
        fn ad_breaks(&self) -> Vec<AdBreak> {
            self.breaks.clone()
        }
        fn on_player_signal(&mut self, _signal: PlayerSignal) {}
        fn report_click(&mut self) {}
        fn skip_current_ad(&mut self) {
            self.shared.lock().unwrap().skips += 1;
        }
        fn shutdown(&mut self) {
            self.shared.lock().unwrap().shutdowns += 1;
        }
    }

    fn stub(fail: Option<SessionErrorCode>) -> (Box<dyn AdSession>, Arc<Mutex<Shared>>) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let session = StubSession {
            shared: shared.clone(),
            breaks: vec![AdBreak::new(30.0, 10.0, AdBreakPosition::Midroll)],
            fail,
        };
        (Box::new(session), shared)
    }

    fn source() -> SourceConfig {
        SourceConfig::new("https://example.com/vod.m3u8", PlaybackMode::Vod)
    }

    fn send(shared: &Arc<Mutex<Shared>>, event: SessionEvent) {
        let guard = shared.lock().unwrap();
        assert!(guard.sender.as_ref().unwrap().send(event));
    }

    #[tokio::test]
    async fn load_success_and_failure() {
        let mut lifecycle = AdLifecycle::new(AdImmunityConfig::default(), 0.25);
        assert_eq!(lifecycle.state(), LifecycleState::Idle);

        let (session, _) = stub(None);
        let ready = lifecycle
            .load(session, &source(), AdImmunityConfig::default())
            .await
            .unwrap();
        assert!(ready.playback_url.ends_with("?stitched"));
        assert_eq!(lifecycle.state(), LifecycleState::Initialized);
        assert_eq!(lifecycle.timeline().parts().len(), 1);

        let (session, shared) = stub(Some(SessionErrorCode::ConnectionTimeout));
        let err = lifecycle
            .load(session, &source(), AdImmunityConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.session_code(), Some(SessionErrorCode::ConnectionTimeout));
        assert_eq!(lifecycle.state(), LifecycleState::TornDown);
        assert_eq!(lifecycle.session_id(), None);
        assert_eq!(shared.lock().unwrap().shutdowns, 1);
    }

    #[tokio::test]
    async fn break_and_ad_transitions() {
        let mut lifecycle = AdLifecycle::new(AdImmunityConfig::default(), 0.25);
        let (session, shared) = stub(None);
        lifecycle
            .load(session, &source(), AdImmunityConfig::default())
            .await
            .unwrap();
        lifecycle.on_source_loaded();
        lifecycle.set_user_speed(2.0);

        send(
            &shared,
            SessionEvent::AdBreakStarted(AdBreak::new(30.0, 10.0, AdBreakPosition::Midroll)),
        );
        let actions = lifecycle.drain();
        assert_eq!(actions[0], Action::SetSpeed(1.0));
        assert!(matches!(
            actions[1],
            Action::Emit(BridgeEvent::AdBreakStarted { .. })
        ));
        assert_eq!(lifecycle.state(), LifecycleState::AdBreakActive);

        send(&shared, SessionEvent::AdFinished);
        assert!(lifecycle.drain().is_empty());

        lifecycle.cache_seek(50.0);
        send(&shared, SessionEvent::AdBreakFinished);
        let actions = lifecycle.drain();
        assert!(matches!(
            actions[0],
            Action::Emit(BridgeEvent::AdBreakFinished { .. })
        ));
        assert_eq!(actions[1], Action::ReplaySeek(50.0));
        assert_eq!(actions[2], Action::SetSpeed(2.0));
        assert_eq!(lifecycle.cached_seek(), None);
        assert_eq!(lifecycle.state(), LifecycleState::SteadyState);
    }

    #[tokio::test]
    async fn teardown_skips_active_ad() {
        let mut lifecycle = AdLifecycle::new(AdImmunityConfig::default(), 0.25);
        let (session, shared) = stub(None);
        lifecycle
            .load(session, &source(), AdImmunityConfig::default())
            .await
            .unwrap();

        let mut ad_break = AdBreak::new(30.0, 10.0, AdBreakPosition::Midroll);
        let ad = Ad {
            id: "a".into(),
            duration: 10.0,
            start: 30.0,
            skip_offset: None,
            sequence: 1,
            companions: Vec::new(),
            click_through_url: None,
            is_linear: true,
            extensions: Default::default(),
        };
        ad_break.ads.push(ad.clone());
        send(&shared, SessionEvent::AdBreakStarted(ad_break));
        send(&shared, SessionEvent::AdStarted(ad));
        lifecycle.drain();
        assert_eq!(lifecycle.state(), LifecycleState::AdActive);
        assert_eq!(lifecycle.current_time(33.0), 3.0);

        lifecycle.teardown();
        let shared = shared.lock().unwrap();
        assert_eq!(shared.skips, 1);
        assert_eq!(shared.shutdowns, 1);
        assert_eq!(lifecycle.state(), LifecycleState::TornDown);
        assert!(lifecycle.active_ad().is_none());
    }

    #[tokio::test]
    async fn rewind_jitter_suppressed() {
        let mut lifecycle = AdLifecycle::new(AdImmunityConfig::default(), 0.25);
        assert!(lifecycle.on_time_changed(10.0).is_some());
        assert!(lifecycle.on_time_changed(9.9).is_none());
        assert!(lifecycle.on_time_changed(5.0).is_some());
    }
}
