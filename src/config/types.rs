use adbridge_media::SynthesizerConfig;
use serde::{Deserialize, Serialize};

/// Bridge-wide configuration. Every field has a default so an empty file is
/// valid.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub immunity: AdImmunityConfig,

    /// A time-changed event that moves the playhead backwards by less than
    /// this many seconds is treated as jitter and suppressed.
    #[serde(default = "default_rewind_tolerance")]
    pub rewind_tolerance: f64,

    /// Seconds before the final break that playback parks at when skipping
    /// the last ad fakes the end of the stream.
    #[serde(default = "default_end_of_stream_backoff")]
    pub end_of_stream_backoff: f64,

    /// Expand date-range signaling into synthetic timed metadata.
    #[serde(default = "default_true")]
    pub date_range_emulation: bool,

    #[serde(default)]
    pub synthesizer: SynthesizerConfig,

    /// Capacity of the consumer event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Log every forwarded engine event at debug level.
    #[serde(default)]
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            immunity: AdImmunityConfig::default(),
            rewind_tolerance: default_rewind_tolerance(),
            end_of_stream_backoff: default_end_of_stream_backoff(),
            date_range_emulation: true,
            synthesizer: SynthesizerConfig::default(),
            event_capacity: default_event_capacity(),
            debug: false,
        }
    }
}

/// Post-break window during which further ad breaks are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AdImmunityConfig {
    /// Length of the window in seconds (0 disables immunity).
    #[serde(default)]
    pub duration: f64,

    /// Look-ahead added to the playhead when probing for upcoming breaks.
    #[serde(default = "default_ad_break_check_offset")]
    pub ad_break_check_offset: f64,

    /// Permanently deactivate breaks skipped during immunity.
    #[serde(default)]
    pub disable_passed_ad_breaks: bool,
}

impl AdImmunityConfig {
    /// Whether immunity is switched on at all.
    pub fn is_enabled(&self) -> bool {
        self.duration > 0.0
    }
}

impl Default for AdImmunityConfig {
    fn default() -> Self {
        Self {
            duration: 0.0,
            ad_break_check_offset: default_ad_break_check_offset(),
            disable_passed_ad_breaks: false,
        }
    }
}

fn default_rewind_tolerance() -> f64 {
    0.25
}

fn default_end_of_stream_backoff() -> f64 {
    0.5
}

fn default_ad_break_check_offset() -> f64 {
    0.1
}

fn default_event_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}
