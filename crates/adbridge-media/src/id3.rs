//! ID3v2 tag parsing.
//!
//! Only what in-band ad signaling needs is supported: the 10-byte tag header
//! and a flat run of frames. Text frames are kept when their first data byte
//! says UTF-8; every other frame is skipped.
//!
//! Header layout:
//!
//! | bytes | field                                   |
//! |-------|-----------------------------------------|
//! | 0..3  | `"ID3"`                                 |
//! | 3..5  | version (major, revision), <= `0x0400`  |
//! | 5     | flags                                   |
//! | 6..10 | syncsafe tag size (excluding header)    |

use bytes::Buf;

use crate::{Error, Result};

/// Length of the tag header and of each frame header.
pub const HEADER_LEN: usize = 10;

/// Newest supported version (ID3v2.4.0).
pub const MAX_VERSION: u16 = 0x0400;

const MAGIC: &[u8; 3] = b"ID3";
const FLAG_UNSYNCHRONISATION: u8 = 0x80;
const FLAG_EXTENDED_HEADER: u8 = 0x40;
const FLAG_RESERVED: u8 = 0x0F;
const DISALLOWED_FLAGS: u8 = FLAG_UNSYNCHRONISATION | FLAG_EXTENDED_HEADER | FLAG_RESERVED;
const ENCODING_UTF8: u8 = 0x03;

/// Parsed tag header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Id3Header {
    /// Major version and revision, big-endian (`0x0300` = v2.3.0).
    pub version: u16,
    /// Header flags.
    pub flags: u8,
    /// Size of the tag body following the header.
    pub size: u32,
}

/// A UTF-8 text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Id3Frame {
    /// Four character frame id (e.g. `YMID`, `TXXX`).
    pub id: String,
    /// Frame text with the encoding byte and trailing NULs removed.
    pub value: String,
}

/// A parsed tag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Id3Tag {
    pub header: Id3Header,
    pub frames: Vec<Id3Frame>,
}

impl Id3Tag {
    /// Look up the first frame with the given id.
    pub fn frame(&self, id: &str) -> Option<&str> {
        self.frames
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.value.as_str())
    }
}

/// Decode a 4-byte syncsafe integer (7 significant bits per byte).
pub fn decode_syncsafe(bytes: [u8; 4]) -> Result<u32> {
    if bytes.iter().any(|b| b & 0x80 != 0) {
        return Err(Error::InvalidSyncsafe(bytes));
    }
    Ok(bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 7) | u32::from(b)))
}

/// Encode a value as a 4-byte syncsafe integer. Values above 28 bits are
/// truncated.
pub fn encode_syncsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// Parse and validate the tag header.
pub fn parse_header(data: &[u8]) -> Result<Id3Header> {
    Error::ensure(HEADER_LEN, data.len())?;
    let mut buf = &data[..HEADER_LEN];

    let mut magic = [0u8; 3];
    buf.copy_to_slice(&mut magic);
    if &magic != MAGIC {
        return Err(Error::InvalidMagic(magic));
    }

    let version = buf.get_u16();
    if version > MAX_VERSION {
        return Err(Error::UnsupportedVersion {
            version,
            max: MAX_VERSION,
        });
    }

    let flags = buf.get_u8();
    if flags & DISALLOWED_FLAGS != 0 {
        return Err(Error::DisallowedFlags { flags });
    }

    let mut size_bytes = [0u8; 4];
    buf.copy_to_slice(&mut size_bytes);
    let size = decode_syncsafe(size_bytes)?;
    if size == 0 {
        return Err(Error::EmptyTag);
    }

    Ok(Id3Header {
        version,
        flags,
        size,
    })
}

/// Parse a complete tag. Any malformed frame fails the whole tag.
pub fn parse_tag(data: &[u8]) -> Result<Id3Tag> {
    let header = parse_header(data)?;
    let end = HEADER_LEN + header.size as usize;
    Error::ensure(end, data.len())?;

    let mut frames = Vec::new();
    let mut offset = HEADER_LEN;

    while offset + HEADER_LEN <= end {
        let mut buf = &data[offset..offset + HEADER_LEN];

        let mut id = [0u8; 4];
        buf.copy_to_slice(&mut id);
        if id[0] == 0 {
            // Padding runs to the end of the tag.
            break;
        }
        if !id.iter().all(u8::is_ascii_alphanumeric) {
            return Err(Error::InvalidFrameId(id));
        }
        let id = String::from_utf8_lossy(&id).into_owned();

        let mut size_bytes = [0u8; 4];
        buf.copy_to_slice(&mut size_bytes);
        let size = decode_syncsafe(size_bytes)? as usize;
        buf.advance(2);

        let data_start = offset + HEADER_LEN;
        if data_start + size > end {
            return Err(Error::FrameOverrun {
                id,
                size,
                offset: data_start,
                end,
            });
        }

        if let Some(value) = utf8_text(&data[data_start..data_start + size]) {
            frames.push(Id3Frame { id, value });
        } else {
            tracing::trace!(frame = %id, size, "Skipping non UTF-8 ID3 frame");
        }

        offset = data_start + size;
    }

    Ok(Id3Tag { header, frames })
}

fn utf8_text(data: &[u8]) -> Option<String> {
    let (&encoding, text) = data.split_first()?;
    if encoding != ENCODING_UTF8 {
        return None;
    }
    let text = std::str::from_utf8(text).ok()?;
    Some(text.trim_end_matches('\0').to_string())
}

/// Build a tag from text frames. Used by tests and the CLI fixtures.
pub fn build_tag(version: u16, flags: u8, frames: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, value) in frames {
        let size = value.len() as u32 + 1;
        body.extend_from_slice(&id.as_bytes()[..4.min(id.len())]);
        body.extend_from_slice(&encode_syncsafe(size));
        body.extend_from_slice(&[0, 0]);
        body.push(ENCODING_UTF8);
        body.extend_from_slice(value.as_bytes());
    }

    let mut tag = Vec::with_capacity(HEADER_LEN + body.len());
    tag.extend_from_slice(MAGIC);
    tag.extend_from_slice(&version.to_be_bytes());
    tag.push(flags);
    tag.extend_from_slice(&encode_syncsafe(body.len() as u32));
    tag.extend_from_slice(&body);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syncsafe() {
        assert_eq!(decode_syncsafe([0, 0, 0x02, 0x01]).unwrap(), 257);
        assert_eq!(decode_syncsafe([0x7F, 0x7F, 0x7F, 0x7F]).unwrap(), 0x0FFF_FFFF);
        assert_eq!(encode_syncsafe(257), [0, 0, 0x02, 0x01]);
        assert!(matches!(
            decode_syncsafe([0, 0x80, 0, 0]),
            Err(Error::InvalidSyncsafe(_))
        ));
    }

    #[test]
    fn test_parse_single_frame() {
        let data = build_tag(0x0300, 0, &[("YMID", "abc123")]);
        let tag = parse_tag(&data).unwrap();

        assert_eq!(tag.header.version, 0x0300);
        assert_eq!(tag.frames.len(), 1);
        assert_eq!(tag.frame("YMID"), Some("abc123"));
    }

    #[test]
    fn test_parse_multiple_frames() {
        let data = build_tag(
            0x0400,
            0,
            &[("YMID", "m"), ("YSEQ", "1:2"), ("YTYP", "S"), ("YDUR", "0.1")],
        );
        let tag = parse_tag(&data).unwrap();

        assert_eq!(tag.frames.len(), 4);
        assert_eq!(tag.frame("YSEQ"), Some("1:2"));
        assert_eq!(tag.frame("YDUR"), Some("0.1"));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = build_tag(0x0300, 0, &[("YMID", "x")]);
        data[0] = b'X';
        assert!(matches!(parse_tag(&data), Err(Error::InvalidMagic(_))));
    }

    #[test]
    fn test_version_too_high() {
        let data = build_tag(0x0500, 0, &[("YMID", "x")]);
        let err = parse_tag(&data).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedVersion {
                version: 0x0500,
                ..
            }
        ));
        assert!(err.to_string().contains("0x0500"));
    }

    #[test]
    fn test_disallowed_flags() {
        for flags in [0x80, 0x40, 0x01, 0x08] {
            let data = build_tag(0x0300, flags, &[("YMID", "x")]);
            assert!(
                matches!(parse_tag(&data), Err(Error::DisallowedFlags { .. })),
                "flags {flags:#04x} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero_length_body() {
        let data = build_tag(0x0300, 0, &[]);
        assert!(matches!(parse_tag(&data), Err(Error::EmptyTag)));
    }

    #[test]
    fn test_truncated_tag() {
        let data = build_tag(0x0300, 0, &[("YMID", "abcdef")]);
        let truncated = &data[..data.len() - 2];
        assert!(matches!(
            parse_tag(truncated),
            Err(Error::BufferUnderflow { .. })
        ));
        assert!(matches!(
            parse_header(&data[..6]),
            Err(Error::BufferUnderflow { need: 10, have: 6 })
        ));
    }

    #[test]
    fn test_frame_overrun_fails_whole_tag() {
        let mut data = build_tag(0x0300, 0, &[("YMID", "a"), ("YSEQ", "1:1")]);
        // Inflate the second frame's size past the end of the tag.
        let second = HEADER_LEN + HEADER_LEN + 2;
        data[second + 4..second + 8].copy_from_slice(&encode_syncsafe(100));
        assert!(matches!(parse_tag(&data), Err(Error::FrameOverrun { .. })));
    }

    #[test]
    fn test_non_utf8_frames_skipped() {
        let mut data = build_tag(0x0300, 0, &[("PRIV", "owner"), ("YMID", "kept")]);
        // Switch the first frame's encoding byte to ISO-8859-1.
        data[HEADER_LEN + HEADER_LEN] = 0x00;
        let tag = parse_tag(&data).unwrap();
        assert_eq!(tag.frames.len(), 1);
        assert_eq!(tag.frames[0].id, "YMID");
    }

    #[test]
    fn test_padding_stops_frames() {
        let mut data = build_tag(0x0300, 0, &[("YMID", "a")]);
        let pad = 12u32;
        data.extend(std::iter::repeat(0).take(pad as usize));
        let body = (data.len() - HEADER_LEN) as u32;
        data[6..10].copy_from_slice(&encode_syncsafe(body));
        let tag = parse_tag(&data).unwrap();
        assert_eq!(tag.frames.len(), 1);
    }
}
