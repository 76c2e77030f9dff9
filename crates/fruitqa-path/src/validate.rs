//! Validation of dot paths.

use crate::PathError;

/// Maximum number of steps accepted in a path.
pub const MAX_PATH_DEPTH: usize = 64;

/// Validate a dot path before it is used to address a document.
///
/// # Errors
///
/// - [`PathError::EmptyStep`] if the path contains an empty step (`"a..b"`,
///   a leading or trailing dot)
/// - [`PathError::PathTooDeep`] if the path has more than [`MAX_PATH_DEPTH`] steps
///
/// # Example
///
/// ```
/// use fruitqa_path::validate_path;
///
/// validate_path("recepcion.tamano_muestra").unwrap();
/// validate_path("tabla..l1").unwrap_err();
/// validate_path("").unwrap_err();
/// ```
pub fn validate_path(path: &str) -> Result<(), PathError> {
    let mut depth = 0;
    for step in path.split('.') {
        if step.is_empty() {
            return Err(PathError::EmptyStep(path.to_string()));
        }
        depth += 1;
    }
    if depth > MAX_PATH_DEPTH {
        return Err(PathError::PathTooDeep(depth));
    }
    Ok(())
}
