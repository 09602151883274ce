//! Lenient parsing of model text output

use hearth_types::Arguments;
use serde_json::Value;

/// Find the first JSON object or array in a model response.
///
/// Handles markdown code fences and leading or trailing prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = strip_fences(text.trim());

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    let start = trimmed.find(['{', '['])?;
    let candidate = &trimmed[start..];

    // Shrink from the right until the candidate parses
    let mut end = candidate.len();
    while end > 0 {
        let slice = &candidate[..end];
        if slice.ends_with('}') || slice.ends_with(']') {
            if let Ok(value) = serde_json::from_str::<Value>(slice) {
                return Some(value);
            }
        }
        end = slice
            .char_indices()
            .rev()
            .find(|(_, c)| *c == '}' || *c == ']')
            .map(|(i, _)| if i + 1 == end { i } else { i + 1 })
            .unwrap_or(0);
    }

    None
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}

/// Drop null and empty values the model uses to mean "not given"
pub fn clean_arguments(raw: Arguments) -> Arguments {
    raw.into_iter()
        .filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => {
                let s = s.trim();
                !s.is_empty() && s != "null" && s != "undefined"
            }
            Value::Array(items) => !items.is_empty(),
            _ => true,
        })
        .collect()
}

/// Arguments given either as an object or as a JSON-encoded string
pub fn arguments_from_value(value: Option<&Value>) -> Arguments {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => Arguments::new(),
        },
        _ => Arguments::new(),
    }
}
