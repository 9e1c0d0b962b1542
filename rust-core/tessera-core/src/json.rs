//! # JSON Module
//!
//! Configuration documents are parsed with simd-json; serialization
//! (validation messages, fetched rows) goes through serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON document into a typed value using simd-json
///
/// simd-json parses in place, so the input is copied into a scratch buffer.
///
/// # Errors
///
/// Returns `Error::Config` if the document is malformed or does not match `T`
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes into a typed value using simd-json
///
/// The buffer is used as scratch space and is left modified.
///
/// # Errors
///
/// Returns `Error::Config` if the document is malformed or does not match `T`
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::Config {
        message: format!("Parse error: {e}"),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be represented as JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize a value to pretty-printed JSON string
///
/// # Errors
///
/// Returns `Error::Json` if the value cannot be represented as JSON
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Section {
        default_controller: String,
        loops: u32,
    }

    #[test]
    fn test_parse_json_object() {
        let json = r#"{"default_controller": "home", "loops": 3}"#;
        let data: Section = parse_json(json).unwrap();
        assert_eq!(data.default_controller, "home");
        assert_eq!(data.loops, 3);
    }

    #[test]
    fn test_parse_json_map() {
        let json = r#"{"admin": "/srv/admin", "blog": "/srv/blog"}"#;
        let map: HashMap<String, String> = parse_json(json).unwrap();
        assert_eq!(map.get("blog"), Some(&"/srv/blog".to_string()));
    }

    #[test]
    fn test_parse_json_bytes() {
        let mut bytes = br#"{"default_controller": "error", "loops": 1}"#.to_vec();
        let data: Section = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(data.default_controller, "error");
    }

    #[test]
    fn test_to_json() {
        let data = Section {
            default_controller: "index".to_string(),
            loops: 100,
        };
        let json = to_json(&data).unwrap();
        assert!(json.contains("index"));
        assert!(json.contains("100"));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let result: Result<Section> = parse_json("not valid json");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
