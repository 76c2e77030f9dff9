use serde_json::Value;

/// Performs a deep equality check between two cell trees.
///
/// Numbers compare by numeric value, so `5` and `5.0` are equal. No other
/// coercion happens: the string `"5"` is not equal to the number `5`, and the
/// empty-string sentinel is not equal to `null` or `0`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use fruitqa_util::deep_equal;
///
/// assert!(deep_equal(&json!({"x": 5}), &json!({"x": 5.0})));
/// assert!(!deep_equal(&json!({"x": "5"}), &json!({"x": 5})));
/// assert!(!deep_equal(&json!(""), &json!(0)));
/// ```
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            arr_a.len() == arr_b.len() && arr_a.iter().zip(arr_b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(obj_a), Value::Object(obj_b)) => {
            obj_a.len() == obj_b.len()
                && obj_a
                    .iter()
                    .all(|(key, val_a)| obj_b.get(key).is_some_and(|val_b| deep_equal(val_a, val_b)))
        }
        _ => false,
    }
}
