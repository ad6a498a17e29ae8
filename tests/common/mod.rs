//! Shared test harness for integration tests.
//!
//! Provides a scripted [`MockEngine`] and [`MockSession`] whose state is
//! shared with the test through handles, and a [`TestHarness`] that wires
//! them into a [`Bridge`].

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use adbridge::{
    Ad, AdBreak, AdExtensions, AdSession, Bridge, BridgeConfig, BridgeEvent, Event, PlaybackEngine,
    PlayerEvent, PlayerSignal, SessionErrorCode, SessionEvent, SessionEventSender, SessionInit,
    SessionReady, SourceConfig,
};
use adbridge_common::{AdBreakPosition, PlaybackMode, TimeRange};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EngineState {
    pub loaded: Option<SourceConfig>,
    pub unloads: usize,
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    pub muted: bool,
    pub volume: u8,
    pub speed: f64,
    pub buffered: Vec<TimeRange>,
    pub buffer_level: f64,
    pub seeks: Vec<f64>,
    pub refuse_seeks: bool,
    pub fail_load: bool,
}

pub type EngineHandle = Arc<Mutex<EngineState>>;

pub struct MockEngine {
    state: EngineHandle,
}

impl MockEngine {
    pub fn new(duration: f64) -> (Self, EngineHandle) {
        let state = Arc::new(Mutex::new(EngineState {
            duration,
            paused: true,
            volume: 100,
            speed: 1.0,
            ..Default::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

#[async_trait]
impl PlaybackEngine for MockEngine {
    async fn load(&mut self, source: &SourceConfig) -> adbridge::Result<()> {
        let mut state = self.state.lock();
        if state.fail_load {
            return Err(adbridge::Error::engine("load failed"));
        }
        state.loaded = Some(source.clone());
        Ok(())
    }

    async fn unload(&mut self) -> adbridge::Result<()> {
        let mut state = self.state.lock();
        state.loaded = None;
        state.unloads += 1;
        Ok(())
    }

    fn play(&mut self) {
        self.state.lock().paused = false;
    }

    fn pause(&mut self) {
        self.state.lock().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn seek(&mut self, time: f64) -> bool {
        let mut state = self.state.lock();
        if state.refuse_seeks {
            return false;
        }
        state.seeks.push(time);
        state.current_time = time;
        true
    }

    fn mute(&mut self) {
        self.state.lock().muted = true;
    }

    fn unmute(&mut self) {
        self.state.lock().muted = false;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn volume(&self) -> u8 {
        self.state.lock().volume
    }

    fn set_volume(&mut self, volume: u8) {
        self.state.lock().volume = volume;
    }

    fn playback_speed(&self) -> f64 {
        self.state.lock().speed
    }

    fn set_playback_speed(&mut self, speed: f64) {
        self.state.lock().speed = speed;
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn buffered_ranges(&self) -> Vec<TimeRange> {
        self.state.lock().buffered.clone()
    }

    fn buffer_level(&self) -> f64 {
        self.state.lock().buffer_level
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// What the next created session resolves to.
#[derive(Debug, Clone)]
pub struct SessionScript {
    pub mode: PlaybackMode,
    pub breaks: Vec<AdBreak>,
    pub failure: Option<SessionErrorCode>,
    /// Callbacks pushed during initialization.
    pub early_events: Vec<SessionEvent>,
    /// Never resolve initialization.
    pub hang: bool,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Vod,
            breaks: Vec::new(),
            failure: None,
            early_events: Vec::new(),
            hang: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub url: Option<String>,
    pub sender: Option<SessionEventSender>,
    pub signals: Vec<PlayerSignal>,
    pub clicks: usize,
    pub skips: usize,
    pub shutdowns: usize,
    pub deactivated: Vec<f64>,
}

pub type SessionHandle = Arc<Mutex<SessionState>>;

/// Push a callback as the session would.
pub fn push(session: &SessionHandle, event: SessionEvent) {
    let state = session.lock();
    let sender = state.sender.as_ref().expect("session not initialized");
    assert!(sender.send(event));
}

pub struct MockSession {
    script: SessionScript,
    state: SessionHandle,
}

#[async_trait]
impl AdSession for MockSession {
    async fn initialize(
        &mut self,
        init: SessionInit,
    ) -> Result<SessionReady, SessionErrorCode> {
        {
            let mut state = self.state.lock();
            state.url = Some(init.url.clone());
            for event in &self.script.early_events {
                init.events.send(event.clone());
            }
            if let Some(code) = self.script.failure {
                return Err(code);
            }
            state.sender = Some(init.events.clone());
        }
        if self.script.hang {
            std::future::pending::<()>().await;
        }
        Ok(SessionReady {
            playback_url: format!("{}?session={}", init.url, init.session_id),
        })
    }

    fn mode(&self) -> PlaybackMode {
        self.script.mode
    }

    fn ad_breaks(&self) -> Vec<AdBreak> {
        self.script.breaks.clone()
    }

    fn on_player_signal(&mut self, signal: PlayerSignal) {
        self.state.lock().signals.push(signal);
    }

    fn report_click(&mut self) {
        self.state.lock().clicks += 1;
    }

    fn skip_current_ad(&mut self) {
        self.state.lock().skips += 1;
    }

    fn deactivate_break(&mut self, start: f64) {
        self.state.lock().deactivated.push(start);
    }

    fn shutdown(&mut self) {
        self.state.lock().shutdowns += 1;
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn ad(id: &str, start: f64, duration: f64, skip_offset: Option<f64>) -> Ad {
    Ad {
        id: id.to_string(),
        duration,
        start,
        skip_offset,
        sequence: 1,
        companions: Vec::new(),
        click_through_url: Some(format!("https://ads.example.com/click/{id}")),
        is_linear: true,
        extensions: AdExtensions::default(),
    }
}

/// A break holding one ad that fills it.
pub fn ad_break(start: f64, duration: f64) -> AdBreak {
    let mut brk = AdBreak::new(start, duration, AdBreakPosition::Midroll);
    brk.id = Some(format!("break-{start}"));
    brk.ads.push(ad(&format!("ad-{start}"), start, duration, None));
    brk
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub bridge: Bridge,
    pub engine: EngineHandle,
    pub script: Arc<Mutex<SessionScript>>,
    pub sessions: Arc<Mutex<Vec<SessionHandle>>>,
    pub events: broadcast::Receiver<Event>,
}

impl TestHarness {
    /// VOD harness with the given breaks and a 100s stitched asset.
    pub fn new(breaks: Vec<AdBreak>) -> Self {
        Self::with_config(breaks, BridgeConfig::default())
    }

    pub fn with_config(breaks: Vec<AdBreak>, config: BridgeConfig) -> Self {
        let (engine, engine_handle) = MockEngine::new(100.0);
        let script = Arc::new(Mutex::new(SessionScript {
            breaks,
            ..Default::default()
        }));
        let sessions: Arc<Mutex<Vec<SessionHandle>>> = Arc::new(Mutex::new(Vec::new()));

        let factory = {
            let script = script.clone();
            let sessions = sessions.clone();
            move |_source: &SourceConfig| -> Box<dyn AdSession> {
                let state: SessionHandle = Arc::new(Mutex::new(SessionState::default()));
                sessions.lock().push(state.clone());
                Box::new(MockSession {
                    script: script.lock().clone(),
                    state,
                })
            }
        };

        let bridge = Bridge::new(Box::new(engine), Box::new(factory), config)
            .expect("valid config");
        let events = bridge.subscribe();

        Self {
            bridge,
            engine: engine_handle,
            script,
            sessions,
            events,
        }
    }

    pub fn source() -> SourceConfig {
        SourceConfig::new("https://cdn.example.com/vod/master.m3u8", PlaybackMode::Vod)
    }

    /// Load the default source and report it loaded.
    pub async fn load(&mut self) {
        self.bridge.load(Self::source()).await.expect("load");
        self.bridge.handle_player_event(PlayerEvent::SourceLoaded);
    }

    /// The most recently created session.
    pub fn session(&self) -> SessionHandle {
        self.sessions
            .lock()
            .last()
            .cloned()
            .expect("no session created")
    }

    /// Push a session callback and let the bridge process it.
    pub fn session_event(&mut self, event: SessionEvent) {
        push(&self.session(), event);
        self.bridge.pump();
    }

    /// Move the engine playhead and dispatch a time-changed event.
    pub fn tick(&mut self, time: f64) {
        self.engine.lock().current_time = time;
        self.bridge
            .handle_player_event(PlayerEvent::TimeChanged { time });
    }

    /// Dispatch the engine events a completed seek produces.
    pub fn complete_seek(&mut self, from: f64) {
        let to = self.engine.lock().current_time;
        self.bridge.handle_player_event(PlayerEvent::Seek {
            position: from,
            seek_target: to,
        });
        self.bridge.handle_player_event(PlayerEvent::Seeked);
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.engine.lock().seeks.clone()
    }

    /// Every event broadcast since the last call.
    pub fn drain_events(&mut self) -> Vec<BridgeEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event.payload);
        }
        out
    }

    /// Enter a break holding one ad, as the session would report it.
    pub fn enter_break(&mut self, brk: &AdBreak) {
        self.session_event(SessionEvent::AdBreakStarted(brk.clone()));
        for ad in &brk.ads {
            self.session_event(SessionEvent::AdStarted(ad.clone()));
        }
    }

    /// Finish the ads of a break and the break itself.
    pub fn leave_break(&mut self, brk: &AdBreak) {
        for _ in &brk.ads {
            self.session_event(SessionEvent::AdFinished);
        }
        self.session_event(SessionEvent::AdBreakFinished);
    }
}
