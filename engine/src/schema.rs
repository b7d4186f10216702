//! JSON Schema validation for operation inputs

use crate::error::{EngineError, EngineResult};

/// Validate caller-supplied input against an operation's schema.
/// An empty input is treated as an empty object so operations with
/// all-optional parameters can be invoked with no payload.
pub fn validate_input(input: &[u8], schema: &serde_json::Value) -> EngineResult<()> {
    let input_value = parse_input(input)?;

    let validator = jsonschema::validator_for(schema)
        .map_err(|e| EngineError::Internal(anyhow::anyhow!("Invalid operation schema: {e}")))?;

    if let Err(error) = validator.validate(&input_value) {
        return Err(EngineError::InvalidArgument(format!(
            "input validation failed: {error}"
        )));
    }

    Ok(())
}

/// Parse JSON input bytes into a serde_json::Value
pub fn parse_input(input: &[u8]) -> EngineResult<serde_json::Value> {
    if input.is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(input)
        .map_err(|e| EngineError::InvalidArgument(format!("invalid JSON input: {e}")))
}

/// Deserialize input bytes into a typed parameter struct, mapping empty
/// input to the struct's serde defaults.
pub fn parse_params<T: serde::de::DeserializeOwned>(input: &[u8]) -> EngineResult<T> {
    let value = parse_input(input)?;
    serde_json::from_value(value)
        .map_err(|e| EngineError::InvalidArgument(format!("invalid parameters: {e}")))
}

/// Serialize an operation output to JSON bytes
pub fn serialize_output<T: serde::Serialize>(output: &T) -> EngineResult<Vec<u8>> {
    serde_json::to_vec(output)
        .map_err(|e| EngineError::Internal(anyhow::anyhow!("Failed to serialize output: {e}")))
}
