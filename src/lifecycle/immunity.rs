//! Post-break ad immunity window.
//!
//! The window is a deadline on the tokio clock, so it follows paused time in
//! tests. Expiry is noticed by polling on every dispatch.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::AdImmunityConfig;

/// Longest window the clock will arm. Longer configured windows are clamped.
const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct AdImmunity {
    config: AdImmunityConfig,
    deadline: Option<Instant>,
}

impl AdImmunity {
    pub fn new(config: AdImmunityConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    pub fn config(&self) -> AdImmunityConfig {
        self.config
    }

    /// Replace the configuration. Returns `true` if this switched off a
    /// running window.
    pub fn configure(&mut self, config: AdImmunityConfig) -> bool {
        self.config = config;
        if !config.is_enabled() && self.deadline.is_some() {
            self.deadline = None;
            return true;
        }
        false
    }

    /// Arm the window. Returns `false` when immunity is disabled.
    pub fn start(&mut self) -> bool {
        if !self.config.is_enabled() {
            return false;
        }
        let window = Duration::try_from_secs_f64(self.config.duration)
            .map_or(MAX_WINDOW, |window| window.min(MAX_WINDOW));
        self.deadline = Some(Instant::now() + window);
        true
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() < deadline)
    }

    /// Returns `true` exactly once after the window has run out.
    pub fn poll_expired(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left in the running window.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }
}
