//! Adbridge-Media: timed-metadata extraction for server-side ad sessions
//!
//! Stitched streams announce ad placements in-band. This crate turns the
//! different shapes that signaling arrives in into one [`TagRecord`] shape
//! that an ad session understands.
//!
//! # Modules
//!
//! - `id3` - ID3v2 tag header and text frame parsing
//! - `emsg` - ISO BMFF event message (`emsg`) box parsing
//! - `vendor` - comma separated `key=value` tag strings
//! - `record` - the [`TagRecord`] shape and its required fields
//! - `extract` - one entry point per payload kind
//! - `daterange` - synthetic markers for interval-based (date-range) signaling
//!
//! # Architecture
//!
//! Binary and textual payloads are decoded into key/value pairs, and the
//! pairs are accepted as a [`TagRecord`] only when they carry a media id, a
//! sequence marker, a marker type and a duration. Everything else is generic
//! metadata and is dropped by the caller.
//!
//! Date-range signaling carries no per-marker payload. The
//! [`MetadataSynthesizer`] expands one range into a start marker, periodic
//! mid markers and an end marker, and releases them as playback time passes.

pub mod daterange;
pub mod emsg;
pub mod error;
pub mod extract;
pub mod id3;
pub mod record;
pub mod vendor;

pub use daterange::{DateRangeSignal, MetadataSynthesizer, SynthesizerConfig, SyntheticMarker};
pub use emsg::EventMessage;
pub use error::{Error, Result};
pub use extract::{extract_record, TagPayload};
pub use id3::{Id3Frame, Id3Header, Id3Tag};
pub use record::{MarkerKind, TagRecord};
