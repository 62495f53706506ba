use miette::Diagnostic;
use std::collections::BTreeMap;
use thiserror::Error;

/// The opaque key-value map a producer attaches to an event. The pipeline
/// only preserves and replays it; handlers define their own keys.
///
/// A `BTreeMap` keeps the stored JSON form stable across runs.
pub type RoutingInfo = BTreeMap<String, String>;

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum RoutingInfoError {
    #[error("routing info entry {0:?} is missing a \"=\"")]
    MissingSeparator(String),

    #[error("routing info entry {0:?} has an empty key")]
    EmptyKey(String),

    #[error("routing info entry {0:?} has an empty value")]
    EmptyValue(String),

    #[error("routing info key {0:?} appears more than once")]
    DuplicateKey(String),
}

/// Parses the `X-Tenso-Routing-Info` header value: comma-separated `key=value`
/// pairs with whitespace trimmed around pairs, keys, and values. Empty
/// fragments (e.g. a trailing comma) are ignored.
pub fn parse_routing_info(header: &str) -> Result<RoutingInfo, RoutingInfoError> {
    let mut info = RoutingInfo::new();

    for pair in header.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| RoutingInfoError::MissingSeparator(pair.to_string()))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(RoutingInfoError::EmptyKey(pair.to_string()));
        }
        if value.is_empty() {
            return Err(RoutingInfoError::EmptyValue(pair.to_string()));
        }
        if info.insert(key.to_string(), value.to_string()).is_some() {
            return Err(RoutingInfoError::DuplicateKey(key.to_string()));
        }
    }

    Ok(info)
}

pub fn encode_routing_info(info: &RoutingInfo) -> String {
    serde_json::to_string(info).expect("serializing a string map can't fail")
}

pub fn decode_routing_info(json: &str) -> Result<RoutingInfo, serde_json::Error> {
    if json.trim().is_empty() {
        return Ok(RoutingInfo::new());
    }
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_headers_parse_to_an_empty_map() {
        assert!(parse_routing_info("").unwrap().is_empty());
        assert!(parse_routing_info("  ").unwrap().is_empty());
        assert!(parse_routing_info(",,").unwrap().is_empty());
    }

    #[test]
    fn single_and_multiple_pairs_parse() {
        let info = parse_routing_info("k1=v1").unwrap();
        assert_eq!(info.get("k1").map(String::as_str), Some("v1"));

        let info = parse_routing_info(" k1 = v1 , k2=v2, k3=v3 ").unwrap();
        assert_eq!(info.len(), 3);
        assert_eq!(info.get("k2").map(String::as_str), Some("v2"));
    }

    #[test]
    fn trailing_comma_is_tolerated() {
        let info = parse_routing_info("k1=v1,").unwrap();
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert_eq!(
            parse_routing_info("k1"),
            Err(RoutingInfoError::MissingSeparator("k1".to_string()))
        );
        assert_eq!(
            parse_routing_info("=v1"),
            Err(RoutingInfoError::EmptyKey("=v1".to_string()))
        );
        assert_eq!(
            parse_routing_info("k1="),
            Err(RoutingInfoError::EmptyValue("k1=".to_string()))
        );
        assert_eq!(
            parse_routing_info("k1=v1,k1=v2"),
            Err(RoutingInfoError::DuplicateKey("k1".to_string()))
        );
    }

    #[test]
    fn values_may_contain_further_equals_signs() {
        let info = parse_routing_info("query=a=b").unwrap();
        assert_eq!(info.get("query").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn stored_form_round_trips() {
        let info = parse_routing_info("b=2,a=1").unwrap();
        let encoded = encode_routing_info(&info);
        assert_eq!(encoded, r#"{"a":"1","b":"2"}"#);
        assert_eq!(decode_routing_info(&encoded).unwrap(), info);
        assert!(decode_routing_info("").unwrap().is_empty());
    }
}
