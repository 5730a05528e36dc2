//! Semantic comparison of query results against expected outputs.
//!
//! A learner's query can return the right data in a different shape than
//! the reference solution: wrapped one level deeper, with keys in another
//! order, or with list items reordered. Grading therefore compares the
//! primitive leaves of both values as sorted lists instead of comparing
//! the JSON trees directly.

use serde_json::{Map, Number, Value};

/// Parse a stored expected-output string.
///
/// Accepted forms, tried in order:
/// - JSON (`{"x": 1}`, `[1, 2]`, `4`)
/// - several `key: value` pairs separated by commas or newlines
///   (`count1: 4, count2: 5`), producing an object
/// - a single `key: value` pair, producing just the value; the key may
///   itself contain colons, so the text after the LAST colon is used
/// - a bare value
///
/// Values in the text forms become numbers or booleans when they look
/// like one, and strings otherwise.
pub fn parse_expected_value(expected: &str) -> Value {
    let trimmed = expected.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    if trimmed.contains(',') || trimmed.contains('\n') {
        let pairs: Vec<&str> = trimmed
            .split([',', '\n'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if pairs.len() > 1 && pairs.iter().all(|p| p.contains(':')) {
            let mut object = Map::new();
            for pair in pairs {
                if let Some((key, value)) = pair.rsplit_once(':') {
                    object.insert(key.trim().to_string(), parse_single_value(value.trim()));
                }
            }
            if object.len() > 1 {
                return Value::Object(object);
            }
        }
    }

    match trimmed.rsplit_once(':') {
        Some((_, value)) => parse_single_value(value.trim()),
        None => parse_single_value(trimmed),
    }
}

/// Interpret a bare token as a number, boolean, or string.
fn parse_single_value(text: &str) -> Value {
    if !text.is_empty() {
        if let Ok(number) = text.parse::<f64>() {
            if number.is_finite() {
                return number_value(number);
            }
        }
    }
    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    Value::String(text.to_string())
}

fn number_value(number: f64) -> Value {
    // Integral values stay integers so `4` and `4.0` both read back as 4.
    if number.fract() == 0.0 && number.abs() < 9_007_199_254_740_992.0 {
        Value::from(number as i64)
    } else {
        Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}

/// Flatten a value into its primitive leaves.
///
/// Arrays keep their element order. Object leaves follow the map's key
/// order, which is irrelevant to [`compare_values_semantically`] since it
/// sorts before comparing.
///
/// ```
/// # use gellyfish_core::compare::extract_primitive_values;
/// # use serde_json::json;
/// let nested = json!({"jellyfishes": {"count(id)": 4}});
/// assert_eq!(extract_primitive_values(&nested), vec![&json!(4)]);
/// ```
pub fn extract_primitive_values(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(extract_primitive_values).collect(),
        Value::Object(map) => map.values().flat_map(extract_primitive_values).collect(),
        primitive => vec![primitive],
    }
}

/// Compare two values by their primitive leaves, ignoring shape and order.
///
/// Returns `false` when the leaf counts differ. Leaves are normalized to
/// strings (numbers use JavaScript formatting, strings are trimmed, null
/// is `"null"`) and compared as sorted lists. Numbers are compared
/// exactly; there is no floating-point tolerance.
pub fn compare_values_semantically(actual: &Value, expected: &Value) -> bool {
    let actual_values = extract_primitive_values(actual);
    let expected_values = extract_primitive_values(expected);

    if actual_values.len() != expected_values.len() {
        return false;
    }
    if actual_values.is_empty() {
        return true;
    }

    let mut actual_normalized: Vec<String> =
        actual_values.into_iter().map(normalize_primitive).collect();
    let mut expected_normalized: Vec<String> =
        expected_values.into_iter().map(normalize_primitive).collect();
    actual_normalized.sort();
    expected_normalized.sort();

    actual_normalized == expected_normalized
}

fn normalize_primitive(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Number(n) => js_number_string(n),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Format a number the way JavaScript's `Number.prototype.toString` does:
/// integral floats lose their fraction, `-0` is `0`, and magnitudes below
/// `1e-6` or from `1e21` up use exponent form (`1e-7`, `1.5e+21`).
pub fn js_number_string(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        return i.to_string();
    }
    if let Some(u) = number.as_u64() {
        return u.to_string();
    }
    let f = number.as_f64().unwrap_or(f64::NAN);
    if f == 0.0 {
        return "0".to_string();
    }
    let magnitude = f.abs();
    if magnitude < 1e-6 || magnitude >= 1e21 {
        let formatted = format!("{f:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    if f.fract() == 0.0 {
        format!("{f:.0}")
    } else {
        f.to_string()
    }
}

/// Collapse a single-element array or single-key object to its content.
pub fn unwrap_single_value(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 => &items[0],
        Value::Object(map) if map.len() == 1 => map.values().next().unwrap_or(value),
        _ => value,
    }
}

/// Render a value as normalized text for exact comparison.
///
/// Single wrappers are removed first; strings are used as-is, null is
/// empty, objects and arrays are pretty-printed JSON.
pub fn normalize_for_compare(value: &Value) -> String {
    let text = match unwrap_single_value(value) {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => js_number_string(n),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    normalize_text(&text)
}

/// Normalize line endings and trailing whitespace of a block of text.
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
