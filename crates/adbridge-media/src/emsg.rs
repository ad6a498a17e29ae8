//! ISO BMFF event message (`emsg`) box parsing.
//!
//! DASH and CMAF streams deliver in-band ad signaling as `emsg` boxes whose
//! message data is either an ID3 tag or a plain text payload.
//!
//! Version 0 carries `scheme_id_uri` and `value` first and a presentation
//! time *delta*; version 1 carries the numeric fields first and an absolute
//! 64-bit presentation time.

use bytes::{Buf, Bytes};

use crate::{Error, Result};

const BOX_TYPE: &[u8; 4] = b"emsg";

/// Scheme URIs whose message data is an ID3 tag.
pub const ID3_SCHEMES: &[&str] = &[
    "https://aomedia.org/emsg/ID3",
    "https://developer.apple.com/streaming/emsg-id3",
    "www.nielsen.com:id3:v1",
];

/// Presentation time of an event message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PresentationTime {
    /// Offset from the earliest presentation time of the segment (v0).
    Delta(u32),
    /// Absolute presentation time on the track timeline (v1).
    Absolute(u64),
}

/// A parsed event message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventMessage {
    pub version: u8,
    pub scheme_id_uri: String,
    pub value: String,
    pub timescale: u32,
    pub presentation_time: PresentationTime,
    pub event_duration: u32,
    pub id: u32,
    #[cfg_attr(feature = "serialize", serde(with = "bytes_as_vec"))]
    pub message_data: Bytes,
}

impl EventMessage {
    /// Presentation time (or delta) in seconds.
    pub fn presentation_secs(&self) -> f64 {
        if self.timescale == 0 {
            return 0.0;
        }
        let ticks = match self.presentation_time {
            PresentationTime::Delta(d) => d as f64,
            PresentationTime::Absolute(t) => t as f64,
        };
        ticks / self.timescale as f64
    }

    /// Event duration in seconds. `0xFFFFFFFF` means unknown.
    pub fn duration_secs(&self) -> Option<f64> {
        if self.timescale == 0 || self.event_duration == u32::MAX {
            return None;
        }
        Some(self.event_duration as f64 / self.timescale as f64)
    }

    /// Whether the message data is an ID3 tag.
    pub fn is_id3(&self) -> bool {
        ID3_SCHEMES.contains(&self.scheme_id_uri.as_str()) || self.message_data.starts_with(b"ID3")
    }
}

/// Parse an `emsg` box. Accepts either the whole box (with its 8-byte
/// size/type header) or the box payload starting at the version byte.
pub fn parse_emsg(data: &[u8]) -> Result<EventMessage> {
    let payload = strip_box_header(data)?;
    let mut buf = payload;

    Error::ensure(4, buf.remaining())?;
    let version = buf.get_u8();
    buf.advance(3); // flags

    match version {
        0 => {
            let scheme_id_uri = read_cstring(&mut buf, "scheme_id_uri")?;
            let value = read_cstring(&mut buf, "value")?;
            Error::ensure(16, buf.remaining())?;
            let timescale = buf.get_u32();
            let delta = buf.get_u32();
            let event_duration = buf.get_u32();
            let id = buf.get_u32();
            Ok(EventMessage {
                version,
                scheme_id_uri,
                value,
                timescale,
                presentation_time: PresentationTime::Delta(delta),
                event_duration,
                id,
                message_data: Bytes::copy_from_slice(buf),
            })
        }
        1 => {
            Error::ensure(20, buf.remaining())?;
            let timescale = buf.get_u32();
            let time = buf.get_u64();
            let event_duration = buf.get_u32();
            let id = buf.get_u32();
            let scheme_id_uri = read_cstring(&mut buf, "scheme_id_uri")?;
            let value = read_cstring(&mut buf, "value")?;
            Ok(EventMessage {
                version,
                scheme_id_uri,
                value,
                timescale,
                presentation_time: PresentationTime::Absolute(time),
                event_duration,
                id,
                message_data: Bytes::copy_from_slice(buf),
            })
        }
        other => Err(Error::invalid_emsg(format!("unsupported version {other}"))),
    }
}

fn strip_box_header(data: &[u8]) -> Result<&[u8]> {
    if data.len() >= 8 && &data[4..8] == BOX_TYPE {
        let size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if size < 8 {
            return Err(Error::invalid_emsg(format!("box size {size} below header size")));
        }
        Error::ensure(size, data.len())?;
        return Ok(&data[8..size]);
    }
    Ok(data)
}

fn read_cstring(buf: &mut &[u8], field: &str) -> Result<String> {
    let Some(nul) = buf.iter().position(|&b| b == 0) else {
        return Err(Error::invalid_emsg(format!("unterminated {field}")));
    };
    let text = std::str::from_utf8(&buf[..nul])
        .map_err(|_| Error::invalid_emsg(format!("{field} is not UTF-8")))?
        .to_string();
    buf.advance(nul + 1);
    Ok(text)
}

#[cfg(feature = "serialize")]
mod bytes_as_vec {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        Vec::<u8>::deserialize(d).map(Bytes::from)
    }
}

/// Build a version 0 `emsg` box. Used by tests and the CLI fixtures.
pub fn build_emsg_v0(scheme: &str, value: &str, timescale: u32, delta: u32, data: &[u8]) -> Vec<u8> {
    let mut payload = vec![0u8, 0, 0, 0];
    payload.extend_from_slice(scheme.as_bytes());
    payload.push(0);
    payload.extend_from_slice(value.as_bytes());
    payload.push(0);
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&delta.to_be_bytes());
    payload.extend_from_slice(&u32::MAX.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(data);

    let mut boxed = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    boxed.extend_from_slice(BOX_TYPE);
    boxed.extend_from_slice(&payload);
    boxed
}
