//! Dashboard state carried in the URL hash.
//!
//! The hash query looks like `_g=(time:(from:now-15m,to:now))&_a=(columns:!(message))`:
//! `&`-separated `key=value` segments whose values are percent-encoded rison.

pub mod rison;
pub mod value;

use crate::error::MalformedHashState;
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

pub use value::{Number, Object, Value};

/// Bytes escaped in encoded values: the fragment-unsafe set plus the
/// characters that would break `&`/`=` splitting or re-decoding.
const VALUE_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'%')
    .add(b'&');

const KEY_ESCAPE: &AsciiSet = &VALUE_ESCAPE.add(b'=');

/// Ordered mapping from hash parameter names to decoded values.
///
/// Equality ignores key order; encoding keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashState(IndexMap<String, Value>);

impl HashState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert or replace a key. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Remove a key, keeping the order of the rest
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Drop every key not listed in `keep`
    pub fn retain_keys(&mut self, keep: &[&str]) {
        self.0.retain(|key, _| keep.contains(&key.as_str()));
    }

    /// Object stored under `key`, created when absent and replaced when the
    /// existing value is not an object.
    pub fn object_entry(&mut self, key: &str) -> &mut Object {
        let slot = self.0.entry(key.to_string()).or_insert_with(Value::object);
        if slot.as_object().is_none() {
            *slot = Value::object();
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just set to an object"),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for HashState {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        HashState(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Decode the part of the hash after `?`.
///
/// Empty segments are skipped. A segment without `=` is treated as an empty
/// value, which is itself malformed.
pub fn decode(raw: &str) -> Result<HashState, MalformedHashState> {
    let mut state = HashState::new();
    for segment in raw.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
        let key = percent_decode_str(key).decode_utf8_lossy().into_owned();
        let value = percent_decode_str(value).decode_utf8_lossy();
        let parsed = rison::parse(&value).map_err(|reason| MalformedHashState {
            key: key.clone(),
            reason,
        })?;
        state.insert(key, parsed);
    }
    Ok(state)
}

/// Encode a state back into the hash query form, in key order
pub fn encode(state: &HashState) -> String {
    state
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, KEY_ESCAPE),
                utf8_percent_encode(&rison::to_string(value), VALUE_ESCAPE)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RisonError;
    use proptest::prelude::*;

    #[test]
    fn test_decode_discover_hash() {
        let state = decode(
            "_g=(filters:!(),time:(from:now-15m,to:now))&_a=(columns:!(message),query:(language:kuery,query:'status:%22500%22'))",
        )
        .unwrap();

        assert_eq!(state.keys().collect::<Vec<_>>(), vec!["_g", "_a"]);
        let query = state.get("_a").and_then(|a| a.get("query")).and_then(|q| q.get("query"));
        assert_eq!(query, Some(&Value::from(r#"status:"500""#)));
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("&&").unwrap().is_empty());
    }

    #[test]
    fn test_decode_splits_on_first_equals() {
        let state = decode("_q=(query:'a=b')").unwrap();
        assert_eq!(
            state.get("_q").and_then(|q| q.get("query")),
            Some(&Value::from("a=b"))
        );
    }

    #[test]
    fn test_decode_malformed_reports_key() {
        let err = decode("_g=(time:(from:now)&_a=!x").unwrap_err();
        assert_eq!(err.key, "_g");
        assert!(matches!(err.reason, RisonError::Unterminated { .. }));

        let err = decode("_a=()&token").unwrap_err();
        assert_eq!(err.key, "token");
        assert_eq!(err.reason, RisonError::Empty { pos: 0 });
    }

    #[test]
    fn test_encode_escapes_unsafe_characters() {
        let mut state = HashState::new();
        state.insert("_a", [("query", Value::from(r#"msg:"a & b" 100%"#))].into_iter().collect());
        let encoded = encode(&state);
        assert_eq!(encoded, "_a=(query:'msg:%22a%20%26%20b%22%20100%25')");
        assert_eq!(decode(&encoded).unwrap(), state);
    }

    #[test]
    fn test_encode_keeps_key_order() {
        let state: HashState = [
            ("_g", Value::object()),
            ("_a", Value::object()),
            ("_q", Value::object()),
        ]
        .into_iter()
        .collect();
        assert_eq!(encode(&state), "_g=()&_a=()&_q=()");
    }

    #[test]
    fn test_object_entry_replaces_non_objects() {
        let mut state = HashState::new();
        state.insert("_a", Value::from("garbage"));
        state.object_entry("_a").insert("query".into(), Value::from("x"));
        state.object_entry("_q");

        assert_eq!(state.get("_a").and_then(|a| a.get("query")), Some(&Value::from("x")));
        assert_eq!(state.get("_q"), Some(&Value::object()));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut state = decode("_g=()&_a=()&_q=()").unwrap();
        state.remove("_a");
        assert_eq!(encode(&state), "_g=()&_q=()");
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            (-1.0e12f64..1.0e12).prop_map(Value::from),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
                prop::collection::vec((".*", inner), 0..5)
                    .prop_map(|pairs| pairs.into_iter().collect::<Value>()),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_decode_inverts_encode(
            entries in prop::collection::vec(("[_a-z][_a-z0-9]{0,5}", value_strategy()), 0..4)
        ) {
            let state: HashState = entries.into_iter().collect();
            let decoded = decode(&encode(&state)).unwrap();
            prop_assert_eq!(decoded, state);
        }
    }
}
