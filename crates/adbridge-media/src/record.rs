//! The key/value shape an ad session accepts as timed metadata.

use std::fmt;
use std::str::FromStr;

/// Media identifier key.
pub const KEY_MEDIA_ID: &str = "YMID";
/// Sequence marker key (`index:count`).
pub const KEY_SEQUENCE: &str = "YSEQ";
/// Marker type key (`S`, `M` or `E`).
pub const KEY_TYPE: &str = "YTYP";
/// Duration key.
pub const KEY_DURATION: &str = "YDUR";

/// Whether a key is one of the four record keys.
pub fn is_record_key(key: &str) -> bool {
    matches!(key, KEY_MEDIA_ID | KEY_SEQUENCE | KEY_TYPE | KEY_DURATION)
}

/// Position of a marker within an ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum MarkerKind {
    Start,
    Mid,
    End,
}

impl MarkerKind {
    /// Single letter code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Start => "S",
            Self::Mid => "M",
            Self::End => "E",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MarkerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "S" | "s" => Ok(Self::Start),
            "M" | "m" => Ok(Self::Mid),
            "E" | "e" => Ok(Self::End),
            _ => Err(()),
        }
    }
}

/// One timed-metadata record ready for the ad session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TagRecord {
    /// Media identifier (`YMID`).
    pub media_id: String,
    /// Sequence marker, e.g. `1:3` (`YSEQ`).
    pub sequence: String,
    /// Marker type (`YTYP`).
    pub kind: MarkerKind,
    /// Duration in seconds (`YDUR`).
    pub duration: f64,
}

impl TagRecord {
    /// Build a record from key/value pairs.
    ///
    /// Returns `None` unless all four keys are present and the type and
    /// duration parse; later duplicates of a key override earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut media_id = None;
        let mut sequence = None;
        let mut kind = None;
        let mut duration = None;

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            match key.as_ref().trim() {
                KEY_MEDIA_ID => media_id = Some(value.to_string()),
                KEY_SEQUENCE => sequence = Some(value.to_string()),
                KEY_TYPE => kind = value.parse::<MarkerKind>().ok(),
                KEY_DURATION => duration = value.parse::<f64>().ok().filter(|d| d.is_finite()),
                _ => {}
            }
        }

        let media_id = media_id.filter(|m| !m.is_empty())?;
        Some(Self {
            media_id,
            sequence: sequence?,
            kind: kind?,
            duration: duration?,
        })
    }

    /// Render the record back to its key/value pairs.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_MEDIA_ID, self.media_id.clone()),
            (KEY_SEQUENCE, self.sequence.clone()),
            (KEY_TYPE, self.kind.code().to_string()),
            (KEY_DURATION, self.duration.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_complete() {
        let record = TagRecord::from_pairs([
            ("YMID", "abc"),
            ("YSEQ", "1:1"),
            ("YTYP", "S"),
            ("YDUR", "0.1"),
        ])
        .unwrap();
        assert_eq!(record.media_id, "abc");
        assert_eq!(record.sequence, "1:1");
        assert_eq!(record.kind, MarkerKind::Start);
        assert_eq!(record.duration, 0.1);
    }

    #[test]
    fn test_from_pairs_missing_field() {
        assert!(TagRecord::from_pairs([("YMID", "abc"), ("YSEQ", "1:1"), ("YTYP", "S")]).is_none());
        assert!(TagRecord::from_pairs([("TIT2", "Song title")]).is_none());
    }

    #[test]
    fn test_from_pairs_rejects_bad_values() {
        let bad_type = [("YMID", "a"), ("YSEQ", "1:1"), ("YTYP", "X"), ("YDUR", "1")];
        assert!(TagRecord::from_pairs(bad_type).is_none());

        let bad_duration = [("YMID", "a"), ("YSEQ", "1:1"), ("YTYP", "E"), ("YDUR", "soon")];
        assert!(TagRecord::from_pairs(bad_duration).is_none());
    }

    #[test]
    fn test_to_pairs() {
        let record = TagRecord {
            media_id: "m".into(),
            sequence: "2:3".into(),
            kind: MarkerKind::Mid,
            duration: 15.0,
        };
        let back = TagRecord::from_pairs(record.to_pairs()).unwrap();
        assert_eq!(back, record);
    }
}
