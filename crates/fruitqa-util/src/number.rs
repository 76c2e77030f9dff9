//! Numeric coercion and canonical number cells.

use serde_json::{Number, Value};

/// Interpret a cell as a number.
///
/// Numbers are taken as-is and strings are parsed after trimming. Blank,
/// boolean, non-numeric and non-finite cells yield `None`.
///
/// ```
/// use fruitqa_util::as_number;
/// use serde_json::json;
///
/// assert_eq!(as_number(&json!(4.5)), Some(4.5));
/// assert_eq!(as_number(&json!(" 12 ")), Some(12.0));
/// assert_eq!(as_number(&json!("")), None);
/// assert_eq!(as_number(&json!("n/a")), None);
/// ```
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Whether a cell means "no data entered": missing, `null` or `""`.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Round half away from zero to `places` decimal places.
///
/// ```
/// use fruitqa_util::round_to;
///
/// assert_eq!(round_to(2.25, 1), 2.3);
/// assert_eq!(round_to(-2.25, 1), -2.3);
/// assert_eq!(round_to(2.5, 0), 3.0);
/// ```
pub fn round_to(x: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (x * factor).round() / factor
}

/// The empty-string sentinel.
pub fn empty_cell() -> Value {
    Value::String(String::new())
}

/// Build a canonical number cell.
///
/// Integral values are stored as integers. Non-finite values become the
/// empty-string sentinel, never `NaN`.
pub fn number_cell(x: f64) -> Value {
    if !x.is_finite() {
        return empty_cell();
    }
    if x.fract() == 0.0 && x.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(x as i64));
    }
    Number::from_f64(x).map(Value::Number).unwrap_or_else(empty_cell)
}

/// Build a number cell from an optional result, blank when `None`.
pub fn cell_from(x: Option<f64>) -> Value {
    x.map(number_cell).unwrap_or_else(empty_cell)
}
