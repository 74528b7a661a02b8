//! Converters for value types the engine does not control: timestamps,
//! durations, and byte buffers. The encoder consults these before giving up
//! on a value; the decoder routes through the synthesized source locator
//! like any other class.

use crate::core::{Result, StoreError};
use crate::persist::envelope::{Decoded, PersistRegistry, SourceLocator, OBJECT_SOURCE_KEY};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};

const MODULE: &str = "[]/src/persist/external.rs";

fn converter_envelope(class_name: &str, params: JsonValue) -> JsonValue {
    let source = SourceLocator::new(MODULE, class_name);
    json!({
        (OBJECT_SOURCE_KEY): [source.module, source.class_name, source.version, params]
    })
}

pub fn encode_timestamp(value: &DateTime<Utc>) -> JsonValue {
    converter_envelope("Timestamp", json!({ "iso": value.to_rfc3339() }))
}

pub fn encode_optional_timestamp(value: Option<&DateTime<Utc>>) -> JsonValue {
    match value {
        Some(ts) => encode_timestamp(ts),
        None => JsonValue::Null,
    }
}

pub fn encode_duration(value: &Duration) -> JsonValue {
    converter_envelope(
        "Duration",
        json!({ "seconds": value.num_milliseconds() as f64 / 1000.0 }),
    )
}

pub fn encode_bytes(value: &[u8]) -> JsonValue {
    converter_envelope(
        "Bytes",
        json!({ "base64": base64::engine::general_purpose::STANDARD.encode(value) }),
    )
}

fn decode_timestamp(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let iso = params
        .get("iso")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| StoreError::Serialization("Timestamp params missing iso".to_string()))?;
    let parsed = DateTime::parse_from_rfc3339(iso)
        .map_err(|e| StoreError::Serialization(format!("invalid timestamp: {}", e)))?;
    Ok(Decoded::Timestamp(parsed.with_timezone(&Utc)))
}

fn decode_duration(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let seconds = params
        .get("seconds")
        .and_then(JsonValue::as_f64)
        .ok_or_else(|| StoreError::Serialization("Duration params missing seconds".to_string()))?;
    Ok(Decoded::Duration(Duration::milliseconds(
        (seconds * 1000.0) as i64,
    )))
}

/// Repair missing `=` padding before decoding, the way lenient callers send
/// base64.
pub fn decode_base64_lenient(data: &str) -> Result<Vec<u8>> {
    let mut padded = data.to_string();
    let missing = padded.len() % 4;
    if missing != 0 {
        padded.push_str(&"=".repeat(4 - missing));
    }
    base64::engine::general_purpose::STANDARD
        .decode(padded.as_bytes())
        .map_err(|e| StoreError::InvalidArgument(format!("invalid base64: {}", e)))
}

fn decode_bytes(params: &JsonValue, _version: Option<&str>) -> Result<Decoded> {
    let encoded = params
        .get("base64")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| StoreError::Serialization("Bytes params missing base64".to_string()))?;
    Ok(Decoded::Bytes(decode_base64_lenient(encoded)?))
}

pub fn register_converters(registry: &mut PersistRegistry) {
    registry.register("Timestamp", decode_timestamp);
    registry.register("Duration", decode_duration);
    registry.register("Bytes", decode_bytes);
}
