//! JSON-RPC message validation and tool argument checks.

use serde_json::{Map, Value};

use crate::types::{JsonRpcRequest, McpError, McpResult, JSONRPC_VERSION};

/// Validate that a JSON-RPC request is well-formed.
pub fn validate_request(request: &JsonRpcRequest) -> McpResult<()> {
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(McpError::InvalidRequest(format!(
            "Expected jsonrpc version \"{JSONRPC_VERSION}\", got \"{}\"",
            request.jsonrpc
        )));
    }

    if request.method.is_empty() {
        return Err(McpError::InvalidRequest(
            "Method name must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Normalise tool arguments to an object and check them against the tool's
/// input schema.
///
/// Only the parts of JSON Schema the tools use are enforced: the arguments
/// must be an object, `required` properties must be present and non-null, and
/// declared primitive `type`s must match. Unknown properties are allowed.
pub fn validate_arguments(schema: &Value, arguments: Option<Value>) -> McpResult<Value> {
    let object = match arguments {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(McpError::InvalidParams(format!(
                "Tool arguments must be an object, got {}",
                type_name(&other)
            )))
        }
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if object.get(name).map_or(true, Value::is_null) {
                return Err(McpError::InvalidParams(format!(
                    "Missing required argument '{name}'"
                )));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, value) in &object {
            if value.is_null() {
                continue;
            }
            let expected = properties
                .get(name)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str);
            if let Some(expected) = expected {
                if !matches_type(expected, value) {
                    return Err(McpError::InvalidParams(format!(
                        "Argument '{name}' must be {expected}, got {}",
                        type_name(value)
                    )));
                }
            }
        }
    }

    Ok(Value::Object(object))
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
