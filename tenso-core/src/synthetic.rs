use phf::phf_map;

/// Built-in fixture payloads for the synthetic ingest endpoint, keyed by
/// source payload type. One fixture per validation handler family that ships
/// in this repository.
static FIXTURES: phf::Map<&'static str, &'static str> = phf_map! {
    "test-foo.v1" => r#"{"event":"foo","value":42}"#,
    "release-note.v1" => r#"{"pipeline":"release-tools","version":"1.4.2","summary":"synthetic release note"}"#,
};

pub fn synthetic_payload(payload_type: &str) -> Option<&'static [u8]> {
    FIXTURES.get(payload_type).map(|raw| raw.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ValidationHandler;
    use crate::handlers::{testing::TestValidator, webhook::ReleaseNoteValidator};

    #[test]
    fn unknown_types_have_no_fixture() {
        assert!(synthetic_payload("unknown.v1").is_none());
    }

    #[test]
    fn fixtures_pass_their_own_validators() {
        TestValidator
            .validate(synthetic_payload("test-foo.v1").unwrap())
            .unwrap();
        ReleaseNoteValidator
            .validate(synthetic_payload("release-note.v1").unwrap())
            .unwrap();
    }
}
