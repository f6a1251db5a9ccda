//! Value formatting for report fields.

use crate::payload::FieldValue;

/// Shown in place of any missing, empty or unreadable value.
pub const PLACEHOLDER: &str = "-";

/// Text of an optional field, or the placeholder when it is absent or empty.
pub fn or_placeholder(value: Option<&FieldValue>) -> String {
    match value.map(FieldValue::display) {
        Some(text) if !text.is_empty() => text,
        _ => PLACEHOLDER.to_string(),
    }
}

/// Formats a rate as a pt-BR percentage, e.g. `18 %`, `1.234,5 %`.
///
/// Non-numeric or absent input yields the placeholder.
pub fn percent(value: Option<&FieldValue>) -> String {
    match value.and_then(FieldValue::as_number) {
        Some(number) => format!("{} %", decimal_pt_br(number)),
        None => PLACEHOLDER.to_string(),
    }
}

/// `Sim` / `Não`.
pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Sim"
    } else {
        "Não"
    }
}

/// Decimal comma, dot thousands separator, at most three fraction digits
/// with trailing zeros dropped.
fn decimal_pt_br(number: f64) -> String {
    let rounded = format!("{:.3}", number.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let negative = number < 0.0 && (int_part != "0" || !frac_part.is_empty());
    let sign = if negative { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped},{frac_part}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(v: serde_json::Value) -> FieldValue {
        match v {
            serde_json::Value::Number(n) => FieldValue::Number(n),
            _ => unreachable!(),
        }
    }

    #[test]
    fn percent_uses_brazilian_notation() {
        assert_eq!(percent(Some(&number(json!(18)))), "18 %");
        assert_eq!(percent(Some(&number(json!(18.5)))), "18,5 %");
        assert_eq!(percent(Some(&number(json!(0)))), "0 %");
        assert_eq!(percent(Some(&number(json!(1234.5)))), "1.234,5 %");
        assert_eq!(percent(Some(&number(json!(0.1234)))), "0,123 %");
        assert_eq!(percent(Some(&number(json!(-2.5)))), "-2,5 %");
        assert_eq!(percent(Some(&FieldValue::Text("12,75".into()))), "12,75 %");
    }

    #[test]
    fn percent_degrades_to_placeholder() {
        assert_eq!(percent(None), PLACEHOLDER);
        assert_eq!(percent(Some(&FieldValue::Text(String::new()))), PLACEHOLDER);
        assert_eq!(percent(Some(&FieldValue::Text("isento".into()))), PLACEHOLDER);
        assert_eq!(percent(Some(&FieldValue::Bool(true))), PLACEHOLDER);
    }

    #[test]
    fn placeholder_for_missing_or_empty_text() {
        assert_eq!(or_placeholder(None), "-");
        assert_eq!(or_placeholder(Some(&FieldValue::Text(String::new()))), "-");
        assert_eq!(or_placeholder(Some(&FieldValue::Text("5102".into()))), "5102");
    }
}
