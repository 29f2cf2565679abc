//! JavaScript Value to JSON Conversion
//!
//! The remote context hands posted messages back to the host as plain
//! JavaScript objects (`{data, targetOrigin}`). This module converts those
//! values into `serde_json::Value` so the host can deserialize them with
//! serde.
//!
//! # Type Mapping
//!
//! | JavaScript Type | JSON Type |
//! |-----------------|-----------|
//! | undefined / null | null |
//! | Boolean | boolean |
//! | Number | number |
//! | String | string |
//! | Array | array |
//! | Object | object |
//!
//! Symbol keys are skipped and symbol values become `null`. Nesting deeper
//! than [`MAX_DEPTH`] is rejected, which also catches cyclic objects.

use boa_engine::{
    object::builtins::JsArray,
    property::PropertyKey,
    value::JsValue,
    Context,
};
use farcall_common::protocol::error::{FarcallError, Result};
use serde_json::Value as JsonValue;

const MAX_DEPTH: usize = 128;

/// Convert a Boa `JsValue` into a `serde_json::Value`.
///
/// # Errors
///
/// Returns `FarcallError::JavaScriptExecution` if a property read fails, and
/// `FarcallError::InvalidEnvelope` if a string is not valid UTF-16 or a number
/// is not representable in JSON (NaN, infinities), or nesting exceeds
/// [`MAX_DEPTH`].
pub fn js_value_to_json(value: JsValue, ctx: &mut Context) -> Result<JsonValue> {
    to_json(value, ctx, 0)
}

fn to_json(value: JsValue, ctx: &mut Context, depth: usize) -> Result<JsonValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(JsonValue::Null);
    }

    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }

    if let Some(i) = value.as_i32() {
        return Ok(JsonValue::Number(i.into()));
    }

    if let Some(n) = value.as_number() {
        return serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .ok_or_else(|| FarcallError::InvalidEnvelope(format!("Number {} is not valid JSON", n)));
    }

    if let Some(s) = value.as_string() {
        return Ok(JsonValue::String(s.to_std_string().map_err(|e| {
            FarcallError::InvalidEnvelope(format!("String conversion error: {:?}", e))
        })?));
    }

    if let Some(obj) = value.as_object() {
        if depth >= MAX_DEPTH {
            return Err(FarcallError::InvalidEnvelope(format!(
                "Value nests deeper than {} levels",
                MAX_DEPTH
            )));
        }

        if obj.is_array() {
            let array = JsArray::from_object(obj.clone())
                .map_err(|e| FarcallError::JavaScriptExecution(format!("Object is not a valid array: {}", e)))?;

            let length = array.length(ctx)
                .map_err(|e| FarcallError::JavaScriptExecution(format!("Failed to get array length: {}", e)))?;

            let mut result = Vec::new();
            for i in 0..length {
                let elem = array.get(i, ctx)
                    .map_err(|e| FarcallError::JavaScriptExecution(format!("Failed to get array element {}: {}", i, e)))?;
                result.push(to_json(elem, ctx, depth + 1)?);
            }
            return Ok(JsonValue::Array(result));
        }

        let keys = obj.own_property_keys(ctx)
            .map_err(|e| FarcallError::JavaScriptExecution(format!("Failed to get object keys: {}", e)))?;

        let mut result = serde_json::Map::new();

        for key in keys {
            let key_str = match &key {
                PropertyKey::String(s) => s.to_std_string()
                    .map_err(|e| FarcallError::InvalidEnvelope(format!("String conversion error: {:?}", e))),
                PropertyKey::Index(i) => Ok(i.get().to_string()),
                PropertyKey::Symbol(_) => continue,
            }?;

            let prop_value = obj.get(key.clone(), ctx)
                .map_err(|e| FarcallError::JavaScriptExecution(format!("Failed to get property '{}': {}", key_str, e)))?;
            result.insert(key_str, to_json(prop_value, ctx, depth + 1)?);
        }

        return Ok(JsonValue::Object(result));
    }

    Ok(JsonValue::Null)
}
