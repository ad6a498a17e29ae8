//! Turns engine metadata into signals for the ad session.
//!
//! In-band tags are parsed immediately. Date ranges are either expanded into
//! synthetic markers that are released as playback passes them, or handed
//! to the session untouched when emulation is off.

use adbridge_media::{extract_record, MetadataSynthesizer, SynthesizerConfig, TagPayload, TagRecord};

use crate::engine::Metadata;
use crate::error::Result;
use crate::session::PlayerSignal;

fn read_record(payload: &TagPayload) -> Result<Option<TagRecord>> {
    Ok(extract_record(payload)?)
}

#[derive(Debug)]
pub struct MetadataPipeline {
    emulate_date_ranges: bool,
    synthesizer: MetadataSynthesizer,
}

impl MetadataPipeline {
    pub fn new(emulate_date_ranges: bool, synthesizer: SynthesizerConfig) -> Self {
        Self {
            emulate_date_ranges,
            synthesizer: MetadataSynthesizer::new(synthesizer),
        }
    }

    /// Signals to forward right away for one metadata event. Malformed and
    /// unrelated tags yield nothing.
    pub fn handle(&mut self, metadata: &Metadata) -> Vec<PlayerSignal> {
        match metadata {
            Metadata::Tag(payload) => match read_record(payload) {
                Ok(Some(record)) => {
                    tracing::debug!(
                        media_id = %record.media_id,
                        sequence = %record.sequence,
                        kind = %record.kind,
                        "Forwarding timed metadata"
                    );
                    vec![PlayerSignal::Metadata(record)]
                }
                Ok(None) => {
                    tracing::trace!(kind = metadata.type_name(), "Ignoring generic metadata");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(kind = metadata.type_name(), error = %e, "Dropping malformed metadata");
                    Vec::new()
                }
            },
            Metadata::DateRange(signal) if self.emulate_date_ranges => {
                self.synthesizer.ingest(signal);
                Vec::new()
            }
            Metadata::DateRange(signal) => vec![PlayerSignal::DateRange(signal.clone())],
        }
    }

    /// Synthetic markers due at `absolute`, in time order.
    pub fn due(&mut self, absolute: f64) -> Vec<PlayerSignal> {
        self.synthesizer
            .due(absolute)
            .into_iter()
            .map(|marker| PlayerSignal::Metadata(marker.record))
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.synthesizer.pending().len()
    }

    pub fn reset(&mut self) {
        self.synthesizer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbridge_media::id3::build_tag;
    use crate::error::Error;
    use adbridge_media::{DateRangeSignal, MarkerKind};
    use bytes::Bytes;

    fn pipeline(emulate: bool) -> MetadataPipeline {
        MetadataPipeline::new(emulate, SynthesizerConfig::default())
    }

    #[test]
    fn tag_with_record_is_forwarded() {
        let tag = build_tag(0x0300, 0, &[("TXXX", "YMID=abc,YSEQ=1:1,YTYP=S,YDUR=0.1")]);
        let signals = pipeline(true).handle(&Metadata::Tag(TagPayload::Id3(Bytes::from(tag))));
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            PlayerSignal::Metadata(record) => {
                assert_eq!(record.media_id, "abc");
                assert_eq!(record.kind, MarkerKind::Start);
            }
            other => panic!("unexpected signal: {:?}", other),
        }
    }

    #[test]
    fn malformed_tag_dropped() {
        let tag = build_tag(0x0500, 0, &[("TXXX", "YMID=abc,YSEQ=1:1,YTYP=S,YDUR=0.1")]);
        let signals = pipeline(true).handle(&Metadata::Tag(TagPayload::Id3(Bytes::from(tag))));
        assert!(signals.is_empty());
    }

    #[test]
    fn malformed_tag_reports_media_error() {
        let payload = TagPayload::Emsg(Bytes::from_static(b"\0\0"));
        assert!(matches!(read_record(&payload), Err(Error::Media(_))));

        let payload = TagPayload::Vendor("TIT2=song".into());
        assert!(matches!(read_record(&payload), Ok(None)));
    }

    #[test]
    fn date_range_released_over_time() {
        let mut pipeline = pipeline(true);
        let range = Metadata::DateRange(DateRangeSignal {
            id: "dr".into(),
            start: 20.0,
            duration: Some(4.0),
            ..Default::default()
        });
        assert!(pipeline.handle(&range).is_empty());
        // A repeat within the dedup window adds nothing.
        assert!(pipeline.handle(&range).is_empty());
        assert_eq!(pipeline.pending(), 3);

        assert!(pipeline.due(19.0).is_empty());
        assert_eq!(pipeline.due(20.2).len(), 1);
        assert_eq!(pipeline.due(30.0).len(), 2);
    }

    #[test]
    fn date_range_passthrough_without_emulation() {
        let mut pipeline = pipeline(false);
        let signal = DateRangeSignal {
            id: "dr".into(),
            start: 1.0,
            duration: Some(2.0),
            ..Default::default()
        };
        let signals = pipeline.handle(&Metadata::DateRange(signal.clone()));
        assert_eq!(signals, vec![PlayerSignal::DateRange(signal)]);
        assert_eq!(pipeline.pending(), 0);
    }
}
