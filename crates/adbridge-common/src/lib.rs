//! Adbridge-Common: Shared types used across adbridge.
//!
//! This crate provides common functionality used by the bridge and the media
//! crate:
//!
//! - **Typed IDs**: [`SessionId`], the identity of one loaded ad session
//! - **Core Types**: playback modes, ad break positions, quartiles and
//!   absolute/content [`TimeRange`]s
//! - **Error Handling**: a small error type for parsing these enums
//!
//! # Examples
//!
//! ```
//! use adbridge_common::{PlaybackMode, SessionId, TimeRange};
//!
//! let id = SessionId::new();
//! assert_ne!(id, SessionId::new());
//!
//! let mode: PlaybackMode = "vod".parse().unwrap();
//! assert!(!mode.is_live());
//!
//! let range = TimeRange::new(10.0, 25.0);
//! assert_eq!(range.duration(), 15.0);
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
