use crate::error::MalformedResponse;
use actionplan_protocol::{normalize_steps, GenerationResult};
use serde_json::{Map, Value};

/// Parse and repair a raw generation response.
///
/// A missing, null or blank `category` is replaced by `fallback_category`;
/// `steps` is normalized to a flat list of strings.
pub fn validate_response(
    raw: &str,
    fallback_category: &str,
) -> Result<GenerationResult, MalformedResponse> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| MalformedResponse(format!("response is not JSON: {err}")))?;
    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(MalformedResponse(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    };

    let category = match object.get("category") {
        None | Some(Value::Null) => None,
        Some(Value::String(category)) if category.trim().is_empty() => None,
        Some(Value::String(category)) => Some(category.clone()),
        Some(other) => {
            return Err(MalformedResponse(format!(
                "category must be a string, got {}",
                type_name(other)
            )))
        }
    };
    let category = category.unwrap_or_else(|| {
        log::info!("Response has no category, using predicted '{fallback_category}'");
        fallback_category.to_string()
    });

    Ok(GenerationResult {
        category,
        reason: optional_string(&object, "reason")?,
        steps: match object.get("steps") {
            None | Some(Value::Null) => None,
            Some(steps) => Some(normalize_steps(steps)),
        },
    })
}

fn optional_string(
    object: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, MalformedResponse> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(MalformedResponse(format!(
            "{key} must be a string, got {}",
            type_name(other)
        ))),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
