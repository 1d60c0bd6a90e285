use serde_json::{Map, Value};

/// The parts of an accepted shadow update the dialer reads.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ShadowUpdate {
    /// `state.desired.number`, when it is a JSON string.
    pub number: Option<String>,
    /// Document version attached by the broker.
    pub version: Option<u64>,
}

impl ShadowUpdate {
    /// Parses the payload once. Anything that is not a UTF-8 JSON object, or
    /// has the wrong shape along a path, leaves that field `None`. The number
    /// itself is returned untouched.
    pub fn parse(payload: &[u8]) -> Self {
        // metadata, timestamp and clientToken are ignored
        let Ok(doc) = serde_json::from_slice::<Map<String, Value>>(payload) else {
            return Self::default();
        };
        Self {
            number: doc
                .get("state")
                .and_then(|state| state.pointer("/desired/number"))
                .and_then(Value::as_str)
                .map(String::from),
            version: doc.get("version").and_then(Value::as_u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_number(payload: &[u8]) -> Option<String> {
        ShadowUpdate::parse(payload).number
    }

    #[test]
    fn returns_desired_number() {
        let payload = br#"{"state":{"desired":{"number":"0619844525"}}}"#;
        assert_eq!(extract_number(payload).as_deref(), Some("0619844525"));
    }

    #[test]
    fn ignores_surrounding_shadow_fields() {
        let payload = br#"{
            "state": {"desired": {"number": "+15551234567", "color": "red"}},
            "metadata": {"desired": {"number": {"timestamp": 1520000000}}},
            "version": 12,
            "timestamp": 1520000000
        }"#;
        assert_eq!(
            ShadowUpdate::parse(payload),
            ShadowUpdate {
                number: Some("+15551234567".into()),
                version: Some(12),
            }
        );
    }

    #[test]
    fn missing_path_segments_yield_none() {
        for payload in [
            &br#"{}"#[..],
            br#"{"state":{}}"#,
            br#"{"state":{"desired":{}}}"#,
            br#"{"state":{"reported":{"number":"0619844525"}}}"#,
            br#"{"state":null}"#,
            br#"{"state":{"desired":null}}"#,
        ] {
            assert_eq!(extract_number(payload), None, "{}", String::from_utf8_lossy(payload));
        }
    }

    #[test]
    fn wrong_types_yield_none() {
        for payload in [
            &br#"{"state":{"desired":{"number":619844525}}}"#[..],
            br#"{"state":{"desired":{"number":["0619844525"]}}}"#,
            br#"{"state":{"desired":"0619844525"}}"#,
            br#"{"state":"on"}"#,
            br#"["state"]"#,
            br#"[{"desired":{"number":"0619844525"}}]"#,
            br#""0619844525""#,
        ] {
            assert_eq!(extract_number(payload), None, "{}", String::from_utf8_lossy(payload));
        }
    }

    #[test]
    fn malformed_bytes_yield_none() {
        assert_eq!(extract_number(b""), None);
        assert_eq!(extract_number(b"call 0619844525"), None);
        assert_eq!(extract_number(br#"{"state":{"desired":{"number":"06"#), None);
        assert_eq!(extract_number(&[0xff, 0xfe, b'{', b'}']), None);
    }

    #[test]
    fn empty_number_is_not_validated() {
        let payload = br#"{"state":{"desired":{"number":""}}}"#;
        assert_eq!(extract_number(payload).as_deref(), Some(""));
    }

    #[test]
    fn version_absent_or_non_numeric() {
        assert_eq!(ShadowUpdate::parse(br#"{"state":{}}"#).version, None);
        assert_eq!(ShadowUpdate::parse(br#"{"version":"7"}"#).version, None);
        assert_eq!(ShadowUpdate::parse(b"not json"), ShadowUpdate::default());
    }

    #[test]
    fn version_survives_missing_number() {
        let update = ShadowUpdate::parse(br#"{"state":{"desired":{"number":5}},"version":4}"#);
        assert_eq!(update.number, None);
        assert_eq!(update.version, Some(4));
    }
}
