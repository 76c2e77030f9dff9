//! Cross-table row synchronization.

use serde_json::Value;

use crate::row::label_of;

/// Distinct non-empty trimmed labels of `rows`, in order of first occurrence.
pub fn distinct_labels(rows: &[Value], label_key: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for row in rows {
        let label = label_of(row, label_key);
        if !label.is_empty() && !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

/// Rebuild `rows` so there is exactly one row per label, followed by the
/// manual rows.
///
/// An existing row carrying a label is reused as-is, keeping its id and every
/// other cell; a missing label gets `factory(label)`. Rows with an empty label
/// are manual and are kept, in order, after the synced rows. Rows whose label
/// is no longer among `labels` are dropped.
///
/// ```
/// use fruitqa_engine::sync::sync_rows;
/// use serde_json::json;
///
/// let labels = vec!["A".to_string(), "B".to_string()];
/// let manual = json!({"_id": "m", "calibre": ""});
/// let mut factory = |label: &str| json!({"calibre": label});
///
/// let once = sync_rows(&labels, &[manual.clone()], "calibre", &mut factory);
/// let twice = sync_rows(&labels, &once, "calibre", &mut factory);
/// assert_eq!(once, twice);
/// assert_eq!(once, vec![json!({"calibre": "A"}), json!({"calibre": "B"}), manual]);
/// ```
pub fn sync_rows(
    labels: &[String],
    rows: &[Value],
    label_key: &str,
    factory: &mut dyn FnMut(&str) -> Value,
) -> Vec<Value> {
    let mut out = Vec::with_capacity(labels.len() + rows.len());
    for label in labels {
        match rows.iter().find(|row| &label_of(row, label_key) == label) {
            Some(existing) => out.push(existing.clone()),
            None => out.push(factory(label)),
        }
    }
    out.extend(
        rows.iter()
            .filter(|row| label_of(row, label_key).is_empty())
            .cloned(),
    );
    out
}
