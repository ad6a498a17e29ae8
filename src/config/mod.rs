mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<BridgeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: BridgeConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from the given path or return the default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<BridgeConfig> {
    match custom_path {
        Some(path) => load_config(path),
        None => Ok(BridgeConfig::default()),
    }
}

/// Validate configuration
fn validate_config(config: &BridgeConfig) -> Result<()> {
    config.check()?;
    Ok(())
}

impl BridgeConfig {
    /// Reject values the bridge cannot operate with.
    pub fn check(&self) -> crate::Result<()> {
        let invalid = |msg: &str| Err(crate::Error::Config(msg.to_string()));

        self.immunity.check()?;
        if self.rewind_tolerance < 0.0 {
            return invalid("rewind_tolerance cannot be negative");
        }
        if !(self.end_of_stream_backoff >= 0.0 && self.end_of_stream_backoff.is_finite()) {
            return invalid("end_of_stream_backoff must be a non-negative number of seconds");
        }
        if self.event_capacity == 0 {
            return invalid("event_capacity must be at least 1");
        }

        let synth = &self.synthesizer;
        if synth.mid_interval <= 0.0 {
            return invalid("synthesizer.mid_interval must be positive");
        }
        if synth.start_offset < 0.0 || synth.end_offset < 0.0 || synth.dedup_window < 0.0 {
            return invalid("synthesizer offsets and dedup_window cannot be negative");
        }

        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.immunity.disable_passed_ad_breaks && !self.immunity.is_enabled() {
            warnings.push(
                "immunity.disable_passed_ad_breaks is set but immunity.duration is 0".into(),
            );
        }
        if self.rewind_tolerance > 2.0 {
            warnings.push(format!(
                "rewind_tolerance of {}s will hide deliberate short rewinds",
                self.rewind_tolerance
            ));
        }
        if !self.date_range_emulation && self.synthesizer != Default::default() {
            warnings.push("synthesizer settings are ignored while date_range_emulation is off".into());
        }

        warnings
    }
}

impl AdImmunityConfig {
    /// Reject immunity settings that are negative or not a number.
    ///
    /// Checked both for the bridge-wide config and for per-source overrides.
    pub fn check(&self) -> crate::Result<()> {
        if !(self.duration >= 0.0 && self.duration.is_finite()) {
            return Err(crate::Error::Config(
                "immunity.duration must be a non-negative number of seconds".into(),
            ));
        }
        if !(self.ad_break_check_offset >= 0.0 && self.ad_break_check_offset.is_finite()) {
            return Err(crate::Error::Config(
                "immunity.ad_break_check_offset must be a non-negative number of seconds".into(),
            ));
        }
        Ok(())
    }
}
