use super::raw_table::Value;

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) Coerce a raw cell: empty → Null, integer / finite float → Number,
///    anything else stays text.
pub fn parse_value(raw: &str) -> Value {
    let s = clean_str(raw);
    if s.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        return Value::Number(n);
    }
    Value::Text(s)
}

/// 3) Like [`parse_value`] but never coerces: identifiers such as `0007`
///    keep their exact spelling.
pub fn parse_text(raw: &str) -> Value {
    let s = clean_str(raw);
    if s.is_empty() {
        Value::Null
    } else {
        Value::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_cells() {
        assert_eq!(parse_value(""), Value::Null);
        assert_eq!(parse_value("  "), Value::Null);
        assert_eq!(parse_value("100"), Value::from(100));
        assert_eq!(parse_value("-3"), Value::from(-3));
        assert_eq!(
            parse_value("2.5"),
            Value::Number(serde_json::Number::from_f64(2.5).unwrap())
        );
        assert_eq!(parse_value("\"quit\""), Value::from("quit"));
        assert_eq!(parse_value("run1.ttyrec.bz2"), Value::from("run1.ttyrec.bz2"));
    }

    #[test]
    fn text_cells_are_not_coerced() {
        assert_eq!(parse_text("0007"), Value::from("0007"));
        assert_eq!(parse_text(" 1e3 "), Value::from("1e3"));
        assert_eq!(parse_text(""), Value::Null);
    }

    #[test]
    fn non_finite_floats_stay_text() {
        assert_eq!(parse_value("NaN"), Value::from("NaN"));
        assert_eq!(parse_value("inf"), Value::from("inf"));
    }
}
