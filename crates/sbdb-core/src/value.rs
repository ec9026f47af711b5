use serde_json::{Map, Number, Value};

/// One point of a design space: variable name to chosen value, in
/// declaration order.
pub type Params = Map<String, Value>;

/// Numeric view of a cell. Only JSON numbers qualify; numeric-looking
/// strings are text.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

/// Canonical text form of a value, used for join keys and name lookups.
///
/// Integral floats collapse to their integer form so that `3` and `3.0`
/// read from different sources address the same key.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => number_key(number),
        other => other.to_string(),
    }
}

/// Type-tagged canonical form used to join and deduplicate keys.
///
/// Unlike [`value_key`], the string `"1"` and the number `1` stay distinct,
/// as do the string `"null"` and a null cell. Integral floats still collapse
/// onto integers.
pub fn join_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(text) => format!("s:{text}"),
        Value::Number(number) => format!("n:{}", number_key(number)),
        Value::Bool(flag) => format!("b:{flag}"),
        nested => format!("j:{nested}"),
    }
}

fn number_key(number: &Number) -> String {
    match (number.as_i64(), number.as_f64()) {
        (Some(int), _) => int.to_string(),
        (None, Some(float)) if float.fract() == 0.0 && float.abs() < 9.0e15 => {
            format!("{}", float as i64)
        }
        _ => number.to_string(),
    }
}

/// Render a cell for delimited output. Nested values are written as JSON.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        nested => nested.to_string(),
    }
}

/// Infer a typed cell from delimited text.
///
/// Order: empty/null marker, integer, finite float, boolean, text.
pub fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return Value::Null;
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }

    if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }

    match trimmed.to_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_cell_infers_types() {
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell("NaN"), Value::Null);
        assert_eq!(parse_cell("42"), json!(42));
        assert_eq!(parse_cell(" 2.5 "), json!(2.5));
        assert_eq!(parse_cell("True"), json!(true));
        assert_eq!(parse_cell("M20"), json!("M20"));
        assert_eq!(parse_cell("inf"), json!("inf"));
    }

    #[test]
    fn value_key_collapses_integral_floats() {
        assert_eq!(value_key(&json!(3)), "3");
        assert_eq!(value_key(&json!(3.0)), "3");
        assert_eq!(value_key(&json!(3.5)), "3.5");
        assert_eq!(value_key(&json!("r1")), "r1");
        assert_eq!(value_key(&Value::Null), "null");
    }

    #[test]
    fn join_key_keeps_value_types_apart() {
        assert_eq!(join_key(&json!(3)), join_key(&json!(3.0)));
        assert_ne!(join_key(&json!("1")), join_key(&json!(1)));
        assert_ne!(join_key(&json!("null")), join_key(&Value::Null));
        assert_ne!(join_key(&json!("true")), join_key(&json!(true)));
        assert_eq!(join_key(&json!("r1")), "s:r1");
    }

    #[test]
    fn render_cell_writes_nested_values_as_json() {
        assert_eq!(render_cell(&Value::Null), "");
        assert_eq!(render_cell(&json!("8.8/S")), "8.8/S");
        assert_eq!(render_cell(&json!([1, 2])), "[1,2]");
        assert_eq!(render_cell(&json!({"d": 20})), "{\"d\":20}");
    }
}
