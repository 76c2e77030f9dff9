//! Dot-path utilities for submission documents.
//!
//! A submission is a nested JSON tree whose fields are addressed by
//! dot-separated paths such as `"recepcion.tamano_muestra"` or
//! `"matriz_presiones.0.detalles.3.p1"`. Numeric steps index into arrays.
//!
//! # Example
//!
//! ```
//! use fruitqa_path::{get_path, parse_path, set_path};
//! use serde_json::json;
//!
//! let path = parse_path("recepcion.tamano_muestra");
//! assert_eq!(path, vec!["recepcion".to_string(), "tamano_muestra".to_string()]);
//!
//! let mut doc = json!({});
//! set_path(&mut doc, "recepcion.tamano_muestra", json!(50)).unwrap();
//! assert_eq!(get_path(&doc, "recepcion.tamano_muestra"), Some(&json!(50)));
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

pub mod validate;
pub use validate::{validate_path, MAX_PATH_DEPTH};

/// A single step of a path: an object key or an array index.
pub type PathStep = String;

/// A parsed path.
pub type Path = Vec<PathStep>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid array index `{0}`")]
    InvalidIndex(String),
    #[error("empty path step in `{0}`")]
    EmptyStep(String),
    #[error("path too deep: {0} steps")]
    PathTooDeep(usize),
    #[error("cannot replace the document root")]
    RootWrite,
}

/// Parse a dot path into its steps.
///
/// The empty string is the root path.
///
/// # Example
///
/// ```
/// use fruitqa_path::parse_path;
///
/// assert_eq!(parse_path(""), Vec::<String>::new());
/// assert_eq!(parse_path("a.b.0"), vec!["a", "b", "0"]);
/// ```
pub fn parse_path(path: &str) -> Path {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').map(str::to_string).collect()
}

/// Check if a step is a canonical non-negative array index.
///
/// # Example
///
/// ```
/// use fruitqa_path::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("12"));
/// assert!(!is_valid_index("01"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index("l1"));
/// ```
pub fn is_valid_index(step: &str) -> bool {
    let bytes = step.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == b'0') {
        return false;
    }
    bytes.iter().all(u8::is_ascii_digit)
}

/// Get a value by parsed path.
///
/// Returns `None` when any step is missing.
pub fn get<'a>(val: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = val;
    for step in path {
        current = match current {
            Value::Object(map) => map.get(step)?,
            Value::Array(arr) => arr.get(step.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get a mutable reference to a value by parsed path.
pub fn get_mut<'a>(val: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut current = val;
    for step in path {
        current = match current {
            Value::Object(map) => map.get_mut(step)?,
            Value::Array(arr) => arr.get_mut(step.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Get a value by dot path.
///
/// # Example
///
/// ```
/// use fruitqa_path::get_path;
/// use serde_json::json;
///
/// let doc = json!({"tabla": [{"l1": 4}]});
/// assert_eq!(get_path(&doc, "tabla.0.l1"), Some(&json!(4)));
/// assert_eq!(get_path(&doc, "tabla.1.l1"), None);
/// ```
pub fn get_path<'a>(val: &'a Value, path: &str) -> Option<&'a Value> {
    get(val, &parse_path(path))
}

/// Set a value by parsed path, creating intermediate containers.
///
/// Missing or scalar intermediate values are replaced by an array when the
/// next step is an index and by an object otherwise. An index may address an
/// existing element or the position just past the end, which appends.
///
/// # Errors
///
/// - [`PathError::RootWrite`] for the root path
/// - [`PathError::InvalidIndex`] when a non-index step addresses an array, or
///   an index lies beyond the end of the array
pub fn set(val: &mut Value, path: &[String], new_value: Value) -> Result<(), PathError> {
    let (last, init) = path.split_last().ok_or(PathError::RootWrite)?;
    check_indices(val, path)?;
    let mut current = val;
    for (i, step) in init.iter().enumerate() {
        current = slot(current, step, &path[i + 1])?;
    }
    ensure_container(current, last);
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), new_value);
            Ok(())
        }
        Value::Array(arr) => {
            let idx = index_of(last, arr.len())?;
            if idx == arr.len() {
                arr.push(new_value);
            } else {
                arr[idx] = new_value;
            }
            Ok(())
        }
        _ => Err(PathError::InvalidIndex(last.clone())),
    }
}

/// Set a value by dot path. See [`set`].
pub fn set_path(val: &mut Value, path: &str, new_value: Value) -> Result<(), PathError> {
    set(val, &parse_path(path), new_value)
}

/// Reject a write before anything is created if one of its index steps
/// would land past the end of an existing or newly created array.
fn check_indices(val: &Value, path: &[String]) -> Result<(), PathError> {
    let mut current = Some(val);
    for step in path {
        current = match current {
            Some(Value::Array(arr)) => arr.get(index_of(step, arr.len())?),
            Some(Value::Object(map)) => map.get(step),
            _ => {
                if is_valid_index(step) {
                    index_of(step, 0)?;
                }
                None
            }
        };
    }
    Ok(())
}

fn slot<'a>(current: &'a mut Value, step: &str, next: &str) -> Result<&'a mut Value, PathError> {
    ensure_container(current, step);
    let child = match current {
        Value::Object(map) => map.entry(step.to_string()).or_insert(Value::Null),
        Value::Array(arr) => {
            let idx = index_of(step, arr.len())?;
            if idx == arr.len() {
                arr.push(Value::Null);
            }
            &mut arr[idx]
        }
        _ => return Err(PathError::InvalidIndex(step.to_string())),
    };
    ensure_container(child, next);
    Ok(child)
}

fn ensure_container(value: &mut Value, step: &str) {
    if !value.is_object() && !value.is_array() {
        *value = container_for(step);
    }
}

fn container_for(step: &str) -> Value {
    if is_valid_index(step) {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

/// Parse `step` as an index into an array of `len` elements; `len` itself
/// is accepted and means append.
fn index_of(step: &str, len: usize) -> Result<usize, PathError> {
    if !is_valid_index(step) {
        return Err(PathError::InvalidIndex(step.to_string()));
    }
    match step.parse::<usize>() {
        Ok(idx) if idx <= len => Ok(idx),
        _ => Err(PathError::InvalidIndex(step.to_string())),
    }
}
