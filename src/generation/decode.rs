// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tolerant decoding of generation service responses.
//!
//! Services wrap the effects array in varying ways: markdown fences, prose
//! around the JSON, a different key, a bare array, or nested lists. Decoding
//! normalizes all of these into a flat list of candidate records before any
//! constraint checking happens.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::effects::CandidateEffect;

/// Keys searched, in order, for the effects array
const EFFECT_KEYS: [&str; 2] = ["effects", "groupLights"];

/// Keys searched, in order, for the rationale text
const RATIONALE_KEYS: [&str; 3] = ["reasoning", "rationale", "explanation"];

/// Why a response could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No JSON document could be found in the text
    #[error("response contains no JSON document")]
    NoJson,
    /// JSON was found but no effects list could be extracted
    #[error("response has no effects list")]
    NoEffectList,
}

/// Normalized content of a response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedResponse {
    pub candidates: Vec<CandidateEffect>,
    pub rationale: String,
}

fn object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

fn array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"))
}

/// JSON documents found in free text, most specific first.
///
/// The whole text, then the outermost object, then the outermost array. An
/// array found inside prose counts only when it holds a record, so bracketed
/// prose such as "beat [3]" is not mistaken for a reply.
fn json_candidates(text: &str) -> Vec<Value> {
    let text = text.trim();
    let mut found = Vec::new();
    if let Ok(value) = serde_json::from_str(text) {
        found.push(value);
    }
    if let Some(m) = object_pattern().find(text) {
        if let Ok(value) = serde_json::from_str(m.as_str()) {
            found.push(value);
        }
    }
    if let Some(m) = array_pattern().find(text) {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(m.as_str()) {
            if has_record(&items) {
                found.push(Value::Array(items));
            }
        }
    }
    found
}

/// True when the list holds an object, directly or one level down
fn has_record(items: &[Value]) -> bool {
    items.iter().any(|item| match item {
        Value::Object(_) => true,
        Value::Array(inner) => inner.iter().any(Value::is_object),
        _ => false,
    })
}

fn effects_list(object: &Map<String, Value>) -> Option<&Vec<Value>> {
    EFFECT_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
        .or_else(|| object.values().find_map(Value::as_array))
}

fn rationale(object: &Map<String, Value>) -> String {
    RATIONALE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Flatten one level of nesting, keeping only objects
fn normalize(items: &[Value]) -> Vec<CandidateEffect> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Object(object) => out.push(CandidateEffect::from_object(object)),
            Value::Array(inner) => out.extend(
                inner
                    .iter()
                    .filter_map(Value::as_object)
                    .map(CandidateEffect::from_object),
            ),
            _ => {}
        }
    }
    out
}

/// Records of a list; a non-empty list holding none is not an effect list
fn records(items: &[Value]) -> Result<Vec<CandidateEffect>, DecodeError> {
    if !items.is_empty() && !has_record(items) {
        return Err(DecodeError::NoEffectList);
    }
    Ok(normalize(items))
}

fn decode_value(value: &Value) -> Result<DecodedResponse, DecodeError> {
    match value {
        Value::Object(object) => {
            let items = effects_list(object).ok_or(DecodeError::NoEffectList)?;
            Ok(DecodedResponse {
                candidates: records(items)?,
                rationale: rationale(object),
            })
        }
        Value::Array(items) => Ok(DecodedResponse {
            candidates: records(items)?,
            rationale: String::new(),
        }),
        _ => Err(DecodeError::NoEffectList),
    }
}

/// Decode response text into candidate records and rationale
pub fn decode_response(text: &str) -> Result<DecodedResponse, DecodeError> {
    let mut error = DecodeError::NoJson;
    for value in json_candidates(text) {
        match decode_value(&value) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => error = e,
        }
    }
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::GROUP_LIGHT_KEY;

    const ONE: &str = r#"{"groupLightKey": 4, "MotionEffect": 1, "ColorEffect": 2, "IntensityEffect": 3, "VfxEffect": 0}"#;

    #[test]
    fn test_plain_object() {
        let text = format!(r#"{{"effects": [{}], "reasoning": " Bass hit, lasers. "}}"#, ONE);
        let decoded = decode_response(&text).unwrap();
        assert_eq!(decoded.candidates.len(), 1);
        assert_eq!(decoded.candidates[0].int(GROUP_LIGHT_KEY), Some(4));
        assert_eq!(decoded.rationale, "Bass hit, lasers.");
    }

    #[test]
    fn test_empty_effects() {
        let decoded = decode_response(r#"{"effects": []}"#).unwrap();
        assert!(decoded.candidates.is_empty());
        assert!(decoded.rationale.is_empty());
    }

    #[test]
    fn test_markdown_fenced() {
        let text = format!("Here you go:\n```json\n{{\"effects\": [{}]}}\n```\nEnjoy!", ONE);
        let decoded = decode_response(&text).unwrap();
        assert_eq!(decoded.candidates.len(), 1);
    }

    #[test]
    fn test_alternate_key() {
        let text = format!(r#"{{"lights": [{}], "rationale": "calm"}}"#, ONE);
        let decoded = decode_response(&text).unwrap();
        assert_eq!(decoded.candidates.len(), 1);
        assert_eq!(decoded.rationale, "calm");

        let text = format!(r#"{{"groupLights": [{one}, {one}]}}"#, one = ONE);
        assert_eq!(decode_response(&text).unwrap().candidates.len(), 2);
    }

    #[test]
    fn test_bare_and_nested_arrays() {
        let text = format!("[{one}, [{one}, 5, \"x\"], null]", one = ONE);
        let decoded = decode_response(&text).unwrap();
        assert_eq!(decoded.candidates.len(), 2);

        let text = format!(r#"{{"effects": [[{}]]}}"#, ONE);
        assert_eq!(decode_response(&text).unwrap().candidates.len(), 1);
    }

    #[test]
    fn test_effects_not_a_list_falls_back_to_other_list() {
        let text = format!(r#"{{"effects": "none", "picked": [{}]}}"#, ONE);
        assert_eq!(decode_response(&text).unwrap().candidates.len(), 1);
    }

    #[test]
    fn test_malformed_responses() {
        assert_eq!(decode_response("I cannot help with that."), Err(DecodeError::NoJson));
        assert_eq!(decode_response("{\"effects\": [ oops"), Err(DecodeError::NoJson));
        assert_eq!(decode_response(r#"{"effects": "none"}"#), Err(DecodeError::NoEffectList));
        assert_eq!(decode_response("42"), Err(DecodeError::NoEffectList));
    }

    #[test]
    fn test_bracketed_prose_is_not_a_reply() {
        assert_eq!(
            decode_response("Sorry, beat [3] is too short to light."),
            Err(DecodeError::NoJson)
        );
        assert_eq!(
            decode_response("Options are [1, 2] or [\"none\"]."),
            Err(DecodeError::NoJson)
        );
        assert_eq!(decode_response("[3, 4]"), Err(DecodeError::NoEffectList));
        assert_eq!(
            decode_response(r#"{"effects": [3], "reasoning": "x"}"#),
            Err(DecodeError::NoEffectList)
        );
    }

    #[test]
    fn test_array_with_records_in_prose() {
        let text = format!("Effects: [{}] as requested", ONE);
        let decoded = decode_response(&text).unwrap();
        assert_eq!(decoded.candidates.len(), 1);
        assert!(decode_response("No lights here: []").is_err());
        assert!(decode_response("[]").unwrap().candidates.is_empty());
    }
}
