use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Flatten any stored representation of `steps` into an ordered list of strings.
///
/// - array: string elements are kept verbatim, anything else is rendered as JSON text
/// - string: becomes a one-element list
/// - null: becomes an empty list
/// - any other scalar or object: one element holding its JSON text
#[must_use]
pub fn normalize_steps(raw: &Value) -> Vec<String> {
    match raw {
        Value::Null => Vec::new(),
        Value::String(step) => vec![step.clone()],
        Value::Array(items) => items.iter().map(step_text).collect(),
        other => vec![other.to_string()],
    }
}

fn step_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serde adapter so every record is normalized at the data boundary.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(normalize_steps(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn single_string_becomes_one_step() {
        assert_eq!(
            normalize_steps(&json!("Verify the order number")),
            vec!["Verify the order number".to_string()]
        );
    }

    #[test]
    fn null_becomes_empty() {
        assert!(normalize_steps(&Value::Null).is_empty());
    }

    #[test]
    fn mixed_array_is_flattened_to_strings() {
        let raw = json!(["Open the account", 2, ["nested", "list"], null]);
        assert_eq!(
            normalize_steps(&raw),
            vec![
                "Open the account".to_string(),
                "2".to_string(),
                r#"["nested","list"]"#.to_string(),
                "null".to_string(),
            ]
        );
    }

    #[test]
    fn scalar_is_rendered_as_json_text() {
        assert_eq!(normalize_steps(&json!(true)), vec!["true".to_string()]);
        assert_eq!(
            normalize_steps(&json!({"step": "x"})),
            vec![r#"{"step":"x"}"#.to_string()]
        );
    }

    proptest! {
        #[test]
        fn string_arrays_survive_unchanged(steps in proptest::collection::vec(".*", 0..8)) {
            let raw = Value::Array(steps.iter().cloned().map(Value::String).collect());
            prop_assert_eq!(normalize_steps(&raw), steps);
        }

        #[test]
        fn any_string_is_exactly_one_step(step in ".*") {
            let normalized = normalize_steps(&Value::String(step.clone()));
            prop_assert_eq!(normalized, vec![step]);
        }
    }
}
