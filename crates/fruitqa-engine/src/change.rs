//! Change detection between the previous snapshot and the live document.
//!
//! Rows are matched by position. Within one mutation row order is stable, so
//! position identifies the row. A cell whose value differs from the snapshot
//! was typed by the user in this mutation; an unchanged cell carries a value
//! the engine already processed.

use fruitqa_path::get_path;
use fruitqa_util::deep_equal;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellChange {
    /// The row has no counterpart in the snapshot.
    Added,
    /// The cell value differs from the snapshot.
    Edited,
    /// The cell value is the one already processed.
    Stable,
}

impl CellChange {
    pub fn is_user_edit(self) -> bool {
        !matches!(self, CellChange::Stable)
    }
}

/// Classify one cell of the row collection at `table`.
///
/// Missing cells compare as `null`, so a cell going from absent to `""` is an
/// edit while absent to absent is not.
pub fn cell_change(table: &str, row: usize, column: &str, prev: &Value, next: &Value) -> CellChange {
    let Some(prev_row) = get_path(prev, table).and_then(|rows| rows.get(row)) else {
        return CellChange::Added;
    };
    let before = prev_row.get(column).unwrap_or(&Value::Null);
    let after = get_path(next, table)
        .and_then(|rows| rows.get(row))
        .and_then(|r| r.get(column))
        .unwrap_or(&Value::Null);
    if deep_equal(before, after) {
        CellChange::Stable
    } else {
        CellChange::Edited
    }
}

/// Whether a cell was typed by the user since the snapshot.
pub fn was_user_edited(table: &str, row: usize, column: &str, prev: &Value, next: &Value) -> bool {
    cell_change(table, row, column, prev, next).is_user_edit()
}

/// Whether the value at a dot path differs between snapshot and document.
pub fn value_changed(path: &str, prev: &Value, next: &Value) -> bool {
    let before = get_path(prev, path).unwrap_or(&Value::Null);
    let after = get_path(next, path).unwrap_or(&Value::Null);
    !deep_equal(before, after)
}
