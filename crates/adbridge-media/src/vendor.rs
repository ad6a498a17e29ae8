//! Comma separated `key=value` tag strings.
//!
//! Some platforms hand the ad signaling over as already-decoded text such as
//! `YMID=1234,YSEQ=2:4,YTYP=M,YDUR=30.0` instead of a binary tag.

/// Split a vendor tag string into key/value pairs.
///
/// Segments without `=` or with an empty key are ignored. Only the first `=`
/// separates key from value, so values may contain `=` themselves.
pub fn parse_vendor_tags(text: &str) -> Vec<(String, String)> {
    text.split(',')
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Whether the text looks like a vendor tag string at all.
pub fn looks_like_vendor_tags(text: &str) -> bool {
    text.split(',').any(|s| s.contains('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vendor_tags() {
        let pairs = parse_vendor_tags("YMID=abc,YSEQ=2:4, YTYP=M ,YDUR=30.0");
        assert_eq!(
            pairs,
            vec![
                ("YMID".to_string(), "abc".to_string()),
                ("YSEQ".to_string(), "2:4".to_string()),
                ("YTYP".to_string(), "M".to_string()),
                ("YDUR".to_string(), "30.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_ignores_malformed_segments() {
        let pairs = parse_vendor_tags("junk,=empty,K=v=w,,");
        assert_eq!(pairs, vec![("K".to_string(), "v=w".to_string())]);
    }

    #[test]
    fn test_looks_like_vendor_tags() {
        assert!(looks_like_vendor_tags("a=b"));
        assert!(!looks_like_vendor_tags("plain text"));
    }
}
