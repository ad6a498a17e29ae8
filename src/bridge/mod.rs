//! The consumer-facing facade.
//!
//! [`Bridge`] wraps a [`PlaybackEngine`] and presents the stitched stream as
//! content with client-side style ads. Every delegated engine operation is
//! listed explicitly here or in `controls`; nothing is forwarded implicitly.
//!
//! Native engine events enter through [`Bridge::handle_player_event`]. They
//! are either swallowed (when the bridge caused them), forwarded with their
//! times mapped, or forwarded verbatim. Ad lifecycle events are merged into
//! the same [`EventBus`].

mod controls;
mod suppress;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::ads::{Ad, AdBreak};
use crate::config::{AdImmunityConfig, BridgeConfig};
use crate::engine::{PlaybackEngine, PlayerEvent, PlayerEventKind, SourceConfig};
use crate::error::{Error, Result, SessionErrorCode};
use crate::events::{BridgeEvent, Event, EventBus};
use crate::lifecycle::{Action, AdLifecycle, LifecycleState};
use crate::policy::{AdPolicy, DefaultPolicy};
use crate::session::{PlayerSignal, SessionFactory};
use crate::timed_metadata::MetadataPipeline;
use adbridge_common::{PlaybackMode, TimeRange};

use suppress::Suppressor;

const INTERNAL_SEEK: &[PlayerEventKind] = &[PlayerEventKind::Seek, PlayerEventKind::Seeked];

pub struct Bridge {
    engine: Box<dyn PlaybackEngine>,
    sessions: Box<dyn SessionFactory>,
    policy: Box<dyn AdPolicy>,
    lifecycle: AdLifecycle,
    metadata: MetadataPipeline,
    events: Arc<EventBus>,
    suppressed: Suppressor,
    config: BridgeConfig,
    source: Option<SourceConfig>,
    finished: bool,
}

impl Bridge {
    /// Create a bridge with the [`DefaultPolicy`].
    pub fn new(
        engine: Box<dyn PlaybackEngine>,
        sessions: Box<dyn SessionFactory>,
        config: BridgeConfig,
    ) -> Result<Self> {
        config.check()?;
        Ok(Self {
            engine,
            sessions,
            policy: Box::new(DefaultPolicy),
            lifecycle: AdLifecycle::new(config.immunity, config.rewind_tolerance),
            metadata: MetadataPipeline::new(config.date_range_emulation, config.synthesizer),
            events: Arc::new(EventBus::new(config.event_capacity)),
            suppressed: Suppressor::default(),
            config,
            source: None,
            finished: false,
        })
    }

    pub fn set_policy(&mut self, policy: Box<dyn AdPolicy>) {
        self.policy = policy;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn source(&self) -> Option<&SourceConfig> {
        self.source.as_ref()
    }

    // -----------------------------------------------------------------------
    // Load / unload
    // -----------------------------------------------------------------------

    /// Resolve an ad session for `source` and load its stitched stream.
    ///
    /// Session failures are emitted as [`BridgeEvent::YospaceError`] and
    /// returned.
    pub async fn load(&mut self, source: SourceConfig) -> Result<()> {
        if source.url.trim().is_empty() {
            self.emit(BridgeEvent::session_error(SessionErrorCode::MissingSource));
            return Err(Error::MissingSource);
        }
        if let Some(immunity) = &source.immunity {
            immunity.check()?;
        }

        self.unload().await?;

        let immunity = source.immunity.unwrap_or(self.config.immunity);
        let session = self.sessions.create(&source);
        let ready = match self.lifecycle.load(session, &source, immunity).await {
            Ok(ready) => ready,
            Err(e) => {
                if let Some(code) = e.session_code() {
                    self.emit(BridgeEvent::session_error(code));
                }
                return Err(e);
            }
        };

        if source.immunity.is_some() {
            self.emit(BridgeEvent::AdImmunityConfigured { config: immunity });
        }

        let playback = SourceConfig {
            url: ready.playback_url,
            mode: self.lifecycle.mode(),
            ..source.clone()
        };
        if let Err(e) = self.engine.load(&playback).await {
            tracing::warn!(error = %e, url = %playback.url, "Engine failed to load stitched source");
            self.lifecycle.teardown();
            return Err(e);
        }

        tracing::info!(
            session_id = ?self.lifecycle.session_id(),
            url = %playback.url,
            mode = %playback.mode,
            "Source loaded"
        );
        self.source = Some(source);
        self.pump();
        Ok(())
    }

    /// Tear down the session and unload the engine.
    pub async fn unload(&mut self) -> Result<()> {
        self.lifecycle.teardown();
        self.metadata.reset();
        self.suppressed.clear();
        self.finished = false;
        if self.source.take().is_some() {
            self.engine.unload().await?;
        }
        Ok(())
    }

    /// Unload and drop the bridge.
    pub async fn destroy(mut self) -> Result<()> {
        self.unload().await
    }

    // -----------------------------------------------------------------------
    // Event routing
    // -----------------------------------------------------------------------

    /// Feed one native engine event through the bridge.
    pub fn handle_player_event(&mut self, event: PlayerEvent) {
        self.pump();

        if self.config.debug {
            tracing::debug!(?event, "Engine event");
        }
        let forward = !self.suppressed.take(event.kind());

        let mut actions = Vec::new();
        let mapped = match event {
            PlayerEvent::TimeChanged { time } => {
                let Some(time_actions) = self.lifecycle.on_time_changed(time) else {
                    return;
                };
                actions = time_actions;
                for signal in self.metadata.due(time) {
                    self.lifecycle.signal(signal);
                }
                Some(PlayerEvent::TimeChanged {
                    time: self.lifecycle.current_time(time),
                })
            }
            PlayerEvent::Seek {
                position,
                seek_target,
            } => Some(PlayerEvent::Seek {
                position: self.lifecycle.current_time(position),
                seek_target: self.lifecycle.content_time(seek_target),
            }),
            PlayerEvent::Seeked => {
                let absolute = self.engine.current_time();
                self.lifecycle.on_seeked(absolute);
                Some(PlayerEvent::Seeked)
            }
            PlayerEvent::Playing { time } => {
                self.lifecycle.on_playing();
                Some(PlayerEvent::Playing {
                    time: self.lifecycle.current_time(time),
                })
            }
            PlayerEvent::Paused { time } => {
                self.lifecycle.signal(PlayerSignal::Paused);
                Some(PlayerEvent::Paused {
                    time: self.lifecycle.current_time(time),
                })
            }
            PlayerEvent::StallStarted => {
                self.lifecycle.signal(PlayerSignal::StallStarted);
                Some(PlayerEvent::StallStarted)
            }
            PlayerEvent::StallEnded => {
                self.lifecycle.signal(PlayerSignal::StallEnded);
                Some(PlayerEvent::StallEnded)
            }
            PlayerEvent::Muted => {
                self.lifecycle.signal(PlayerSignal::Muted(true));
                Some(PlayerEvent::Muted)
            }
            PlayerEvent::Unmuted => {
                self.lifecycle.signal(PlayerSignal::Muted(false));
                Some(PlayerEvent::Unmuted)
            }
            PlayerEvent::Metadata(metadata) => {
                for signal in self.metadata.handle(&metadata) {
                    self.lifecycle.signal(signal);
                }
                Some(PlayerEvent::Metadata(metadata))
            }
            PlayerEvent::SourceLoaded => {
                self.lifecycle.on_source_loaded();
                Some(PlayerEvent::SourceLoaded)
            }
            PlayerEvent::PlaybackFinished if self.finished => None,
            other => Some(other),
        };

        if forward {
            if let Some(mapped) = mapped {
                self.emit(BridgeEvent::Player(mapped));
            }
        }
        self.apply(actions);
        self.pump();
    }

    /// Process queued ad session callbacks and a lapsed immunity window.
    pub fn pump(&mut self) {
        let actions = self.lifecycle.drain();
        self.apply(actions);
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Emit(event) => self.emit(event),
                Action::Seek(absolute) => self.internal_seek(absolute),
                Action::SetSpeed(speed) => {
                    if self.engine.playback_speed() != speed {
                        self.suppressed
                            .suppress(&[PlayerEventKind::PlaybackSpeedChanged]);
                        self.engine.set_playback_speed(speed);
                    }
                }
                Action::ReplaySeek(target) => {
                    self.seek(target);
                }
            }
        }
    }

    fn internal_seek(&mut self, absolute: f64) {
        self.suppressed.suppress(INTERNAL_SEEK);
        if !self.engine.seek(absolute) {
            tracing::warn!(absolute, "Engine refused internal seek");
            self.suppressed.release(INTERNAL_SEEK);
        }
    }

    fn emit(&self, event: BridgeEvent) {
        self.events.broadcast(self.lifecycle.session_id(), event);
    }

    // -----------------------------------------------------------------------
    // Read-only views
    // -----------------------------------------------------------------------

    /// Consumer time: ad-relative during a VOD ad, content time otherwise.
    pub fn current_time(&self) -> f64 {
        if self.finished {
            return self.duration();
        }
        self.lifecycle.current_time(self.engine.current_time())
    }

    /// Content duration, or the current ad's duration while a VOD ad plays.
    pub fn duration(&self) -> f64 {
        match self.lifecycle.active_ad() {
            Some(ad) if self.mode() == PlaybackMode::Vod => ad.duration,
            _ => self
                .lifecycle
                .timeline()
                .content_duration(self.engine.duration()),
        }
    }

    pub fn buffered_ranges(&self) -> Vec<TimeRange> {
        self.lifecycle
            .timeline()
            .buffered_ranges(&self.engine.buffered_ranges())
    }

    pub fn buffer_level(&self) -> f64 {
        self.lifecycle.timeline().buffer_level(
            self.engine.current_time(),
            self.engine.buffer_level(),
            self.lifecycle.active_ad(),
        )
    }

    pub fn mode(&self) -> PlaybackMode {
        self.lifecycle.mode()
    }

    pub fn is_live(&self) -> bool {
        self.mode().is_live()
    }

    pub fn is_paused(&self) -> bool {
        self.engine.is_paused()
    }

    pub fn is_muted(&self) -> bool {
        self.engine.is_muted()
    }

    pub fn volume(&self) -> u8 {
        self.engine.volume()
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.engine.set_volume(volume);
    }

    pub fn playback_speed(&self) -> f64 {
        self.engine.playback_speed()
    }

    /// Whether playback ended by skipping the final ad.
    pub fn is_playback_finished(&self) -> bool {
        self.finished
    }

    /// Breaks a consumer should see: active and non-empty.
    pub fn ads_list(&self) -> Vec<AdBreak> {
        self.lifecycle
            .timeline()
            .ad_breaks()
            .into_iter()
            .filter(AdBreak::is_listable)
            .collect()
    }

    pub fn active_ad(&self) -> Option<&Ad> {
        self.lifecycle.active_ad()
    }

    pub fn active_ad_break(&self) -> Option<&AdBreak> {
        self.lifecycle.active_break()
    }

    pub fn ad_immunity_config(&self) -> AdImmunityConfig {
        self.lifecycle.immunity_config()
    }

    pub fn is_ad_immunity_active(&self) -> bool {
        self.lifecycle.is_immunity_active()
    }

    /// Change immunity for the current load and every later one.
    ///
    /// Invalid settings are rejected and leave the current ones in place.
    pub fn set_ad_immunity_config(&mut self, config: AdImmunityConfig) -> Result<()> {
        config.check()?;
        self.config.immunity = config;
        let actions = self.lifecycle.set_immunity_config(config);
        self.apply(actions);
        Ok(())
    }
}
