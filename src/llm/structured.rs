// src/llm/structured.rs
// Recover and validate structured JSON from LLM output.
//
// Providers occasionally wrap JSON in markdown fences or prose even when a
// schema was requested. Recovery is limited to locating the JSON payload;
// anything that then fails shape validation is a SchemaViolation the caller
// retries.

use serde_json::Value;
use tracing::debug;

use crate::error::{MementoError, Result};

/// Extract a JSON value from raw LLM output text.
///
/// Strategies, in order: the whole response parses as JSON; a fenced
/// ```json block; the outermost `{...}` object; the outermost `[...]` array.
pub fn extract_json(response: &str) -> Result<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(response) {
        return Ok(value);
    }

    // Fenced code block
    if let Some(start) = response.find("```") {
        let after = &response[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            let candidate = after[..end].trim();
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                debug!("extracted JSON from fenced code block");
                return Ok(value);
            }
        }
    }

    // Raw object
    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&response[start..=end])
    {
        debug!("extracted raw JSON object");
        return Ok(value);
    }

    // Raw array
    if let (Some(start), Some(end)) = (response.find('['), response.rfind(']'))
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&response[start..=end])
    {
        debug!("extracted raw JSON array");
        return Ok(value);
    }

    let preview: String = response.chars().take(200).collect();
    Err(MementoError::SchemaViolation(format!(
        "no valid JSON in LLM response: {preview}"
    )))
}

/// Validate a value against the `type`/`required`/`properties`/`items`
/// subset of JSON Schema used by the prompts. Violations carry the JSON
/// pointer path of the first offending node.
pub fn validate_shape(value: &Value, schema: &Value) -> Result<()> {
    check(value, schema, "")
}

fn check(value: &Value, schema: &Value, path: &str) -> Result<()> {
    if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
        let ok = match expected {
            "object" => value.is_object(),
            "array" => value.is_array(),
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "null" => value.is_null(),
            _ => true,
        };
        if !ok {
            return Err(MementoError::SchemaViolation(format!(
                "expected {expected} at {}",
                pointer(path)
            )));
        }
    }

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if value.get(field).is_none() {
                return Err(MementoError::SchemaViolation(format!(
                    "missing required field {} at {}",
                    field,
                    pointer(path)
                )));
            }
        }
    }

    if let (Some(properties), Some(object)) = (
        schema.get("properties").and_then(|p| p.as_object()),
        value.as_object(),
    ) {
        for (name, sub_schema) in properties {
            if let Some(sub_value) = object.get(name) {
                if sub_value.is_null() {
                    // Optional fields may come back explicitly null
                    continue;
                }
                check(sub_value, sub_schema, &format!("{path}/{name}"))?;
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (i, item) in array.iter().enumerate() {
            check(item, items, &format!("{path}/{i}"))?;
        }
    }

    Ok(())
}

fn pointer(path: &str) -> &str {
    if path.is_empty() { "root" } else { path }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_fenced_json() {
        let response = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        let value = extract_json(response).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_embedded_object() {
        let response = "The answer is {\"a\": [1, 2]} as requested";
        let value = extract_json(response).unwrap();
        assert_eq!(value["a"][1], 2);
    }

    #[test]
    fn test_extract_failure_is_schema_violation() {
        let err = extract_json("no json here").unwrap_err();
        assert!(matches!(err, MementoError::SchemaViolation(_)));
    }

    #[test]
    fn test_validate_required_fields() {
        let schema = json!({
            "type": "object",
            "required": ["entities"],
            "properties": {
                "entities": {"type": "array", "items": {"type": "object", "required": ["name"]}}
            }
        });

        assert!(validate_shape(&json!({"entities": []}), &schema).is_ok());
        assert!(
            validate_shape(&json!({"entities": [{"name": "Rust"}]}), &schema).is_ok()
        );
        assert!(validate_shape(&json!({}), &schema).is_err());
        assert!(validate_shape(&json!({"entities": [{}]}), &schema).is_err());
    }

    #[test]
    fn test_validate_type_mismatch() {
        let schema = json!({"type": "object", "properties": {"n": {"type": "number"}}});
        assert!(validate_shape(&json!({"n": 3.5}), &schema).is_ok());
        assert!(validate_shape(&json!({"n": "three"}), &schema).is_err());
    }

    #[test]
    fn test_validate_allows_null_optional() {
        let schema = json!({"type": "object", "properties": {"opt": {"type": "string"}}});
        assert!(validate_shape(&json!({"opt": null}), &schema).is_ok());
    }
}
