//! Error types for the bridge.
//!
//! Session resolution failures reject the pending load *and* surface as a
//! [`crate::events::BridgeEvent::YospaceError`]. Policy violations never
//! become an [`Error`]; they are reported as
//! [`crate::events::BridgeEvent::PolicyError`] and the guarded action is
//! simply not performed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an ad session could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionErrorCode {
    /// The session resolved but analytics are not available.
    NoAnalytics,
    /// The session was used before it finished initializing.
    NotInitialized,
    /// The session endpoint could not be reached.
    ConnectionError,
    /// The session endpoint did not answer in time.
    ConnectionTimeout,
    /// The source URL was rejected by the session.
    MalformedUrl,
    /// The stream format is not supported by the session.
    UnknownFormat,
    /// Any other session failure.
    UnknownError,
    /// No playable source URL was given.
    MissingSource,
}

impl SessionErrorCode {
    /// Human-readable description used in error events.
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoAnalytics => "Source URL does not refer to an ad-stitched stream",
            Self::NotInitialized => "Ad session is not initialized",
            Self::ConnectionError => "Could not connect to the ad session",
            Self::ConnectionTimeout => "Connection to the ad session timed out",
            Self::MalformedUrl => "Source URL is malformed",
            Self::UnknownFormat => "Stream format is not supported",
            Self::UnknownError => "Unknown ad session error",
            Self::MissingSource => "No playable source URL provided",
        }
    }
}

impl fmt::Display for SessionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Which guarded action a policy refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyErrorCode {
    SeekNotAllowed,
    SeekToNotAllowed,
    SkipNotAllowed,
    MuteNotAllowed,
    PauseNotAllowed,
    PlaybackSpeedNotAllowed,
}

impl PolicyErrorCode {
    /// Human-readable description used in policy events.
    pub fn message(&self) -> &'static str {
        match self {
            Self::SeekNotAllowed => "Seeking is not allowed",
            Self::SeekToNotAllowed => "Seeking to the requested position is not allowed",
            Self::SkipNotAllowed => "Skipping the ad is not allowed",
            Self::MuteNotAllowed => "Muting is not allowed",
            Self::PauseNotAllowed => "Pausing is not allowed",
            Self::PlaybackSpeedNotAllowed => "Changing the playback speed is not allowed",
        }
    }
}

impl fmt::Display for PolicyErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Error type for bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The ad session failed to resolve.
    #[error("Ad session error: {0}")]
    Session(SessionErrorCode),

    /// The source has no playable URL.
    #[error("No playable source URL provided")]
    MissingSource,

    /// The playback engine reported a failure.
    #[error("Playback engine error: {0}")]
    Engine(String),

    /// Invalid bridge configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metadata could not be parsed.
    #[error("Metadata error: {0}")]
    Media(#[from] adbridge_media::Error),
}

impl Error {
    /// Convenience constructor for [`Error::Engine`].
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// The consumer-facing session error code, if this error has one.
    pub fn session_code(&self) -> Option<SessionErrorCode> {
        match self {
            Self::Session(code) => Some(*code),
            Self::MissingSource => Some(SessionErrorCode::MissingSource),
            _ => None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
