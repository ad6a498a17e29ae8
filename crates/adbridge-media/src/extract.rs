//! One entry point for every payload shape timed metadata arrives in.

use bytes::Bytes;

use crate::emsg::parse_emsg;
use crate::id3::{parse_tag, Id3Frame};
use crate::record::{is_record_key, TagRecord};
use crate::vendor::{looks_like_vendor_tags, parse_vendor_tags};
use crate::Result;

/// Raw timed-metadata payload as delivered by a playback engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TagPayload {
    /// A binary ID3 tag.
    Id3(Bytes),
    /// A binary `emsg` box (or its payload).
    Emsg(Bytes),
    /// ID3 frames the engine has already decoded, as `(frame id, text)`.
    Frames(Vec<(String, String)>),
    /// A vendor `key=value,key=value` string.
    Vendor(String),
}

/// Extract a [`TagRecord`] from a payload.
///
/// `Ok(None)` means the payload parsed but is unrelated generic metadata.
/// Malformed binary payloads return an error and yield nothing.
pub fn extract_record(payload: &TagPayload) -> Result<Option<TagRecord>> {
    let pairs = match payload {
        TagPayload::Id3(data) => pairs_from_frames(parse_tag(data)?.frames),
        TagPayload::Emsg(data) => {
            let message = parse_emsg(data)?;
            if message.is_id3() {
                pairs_from_frames(parse_tag(&message.message_data)?.frames)
            } else {
                match std::str::from_utf8(&message.message_data) {
                    Ok(text) => parse_vendor_tags(text),
                    Err(_) => {
                        tracing::debug!(
                            scheme = %message.scheme_id_uri,
                            "Ignoring non-text emsg payload"
                        );
                        Vec::new()
                    }
                }
            }
        }
        TagPayload::Frames(frames) => pairs_from_frames(
            frames
                .iter()
                .map(|(id, value)| Id3Frame {
                    id: id.clone(),
                    value: value.clone(),
                })
                .collect(),
        ),
        TagPayload::Vendor(text) => parse_vendor_tags(text),
    };

    Ok(TagRecord::from_pairs(pairs))
}

/// Frames named after a record key contribute directly; any other text
/// frame is read as a vendor tag string.
fn pairs_from_frames(frames: Vec<Id3Frame>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for frame in frames {
        if is_record_key(&frame.id) {
            pairs.push((frame.id, frame.value));
        } else if looks_like_vendor_tags(&frame.value) {
            pairs.extend(parse_vendor_tags(&frame.value));
        }
    }
    pairs
}
