//! Row records of row collections and pressure/weight matrices.

use fruitqa_util::{empty_cell, RowIdSource};
use serde_json::{Map, Value};

pub const ROW_ID: &str = "_id";
pub const IS_FIXED: &str = "_isFixed";
pub const IS_READ_ONLY_ROW: &str = "_isReadOnlyRow";
pub const ROW_OPTIONS: &str = "_rowOptions";

pub fn row_id(row: &Value) -> Option<&str> {
    row.get(ROW_ID).and_then(Value::as_str).filter(|id| !id.is_empty())
}

pub fn is_fixed(row: &Value) -> bool {
    row.get(IS_FIXED).and_then(Value::as_bool).unwrap_or(false)
}

pub fn is_read_only_row(row: &Value) -> bool {
    row.get(IS_READ_ONLY_ROW).and_then(Value::as_bool).unwrap_or(false)
}

/// Per-row select choices for `column`, when the row overrides them.
pub fn row_options<'a>(row: &'a Value, column: &str) -> Option<&'a [Value]> {
    row.get(ROW_OPTIONS)?.get(column)?.as_array().map(Vec::as_slice)
}

/// Trimmed text of a label cell. Numbers are rendered, anything else is `""`.
pub fn label_of(row: &Value, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// First row whose label cell equals `label`.
pub fn find_row<'a>(rows: &'a [Value], label_key: &str, label: &str) -> Option<(usize, &'a Value)> {
    rows.iter()
        .enumerate()
        .find(|(_, row)| label_of(row, label_key) == label)
}

/// A new row with a fresh id followed by `cells`.
pub fn new_row(ids: &mut dyn RowIdSource, cells: Map<String, Value>) -> Value {
    let mut row = Map::new();
    row.insert(ROW_ID.to_string(), Value::String(ids.next_id()));
    for (key, value) in cells {
        if key != ROW_ID {
            row.insert(key, value);
        }
    }
    Value::Object(row)
}

/// The single fixed row a governed table is reset to.
pub fn fixed_row(ids: &mut dyn RowIdSource) -> Value {
    let mut cells = Map::new();
    cells.insert(IS_FIXED.to_string(), Value::Bool(true));
    new_row(ids, cells)
}

/// Give every object row without an id a fresh one. Returns how many were filled.
pub fn backfill_row_ids(rows: &mut [Value], ids: &mut dyn RowIdSource) -> usize {
    let mut filled = 0;
    for row in rows.iter_mut() {
        if row_id(row).is_some() {
            continue;
        }
        if let Value::Object(map) = row {
            map.insert(ROW_ID.to_string(), Value::String(ids.next_id()));
            filled += 1;
        }
    }
    filled
}

/// Cell names of a pressure or weight matrix entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixLayout {
    pub label_key: &'static str,
    pub count_key: &'static str,
    pub brix_key: &'static str,
    pub details_key: &'static str,
    /// Measurement sides read from each detail entry.
    pub sides: &'static [&'static str],
}

impl Default for MatrixLayout {
    fn default() -> Self {
        Self {
            label_key: "calibre",
            count_key: "n_frutos",
            brix_key: "brix",
            details_key: "detalles",
            sides: &["p1", "p2"],
        }
    }
}

impl MatrixLayout {
    /// Weight mode: one value per fruit, stored in `p1`.
    pub fn weight() -> Self {
        Self {
            sides: &["p1"],
            ..Self::default()
        }
    }

    pub fn details<'a>(&self, entry: &'a Value) -> &'a [Value] {
        entry
            .get(self.details_key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Measurement cells of one entry, side by side, in detail order.
    pub fn detail_cells<'a>(&self, entry: &'a Value) -> impl Iterator<Item = &'a Value> {
        let sides = self.sides;
        self.details(entry)
            .iter()
            .flat_map(move |detail| sides.iter().filter_map(move |side| detail.get(*side)))
    }

    /// A fresh entry for `label` with no samples.
    pub fn entry(&self, ids: &mut dyn RowIdSource, label: &str) -> Value {
        let mut cells = Map::new();
        cells.insert(self.label_key.to_string(), Value::String(label.to_string()));
        cells.insert(self.count_key.to_string(), Value::from(0));
        cells.insert(self.brix_key.to_string(), empty_cell());
        cells.insert(self.details_key.to_string(), Value::Array(Vec::new()));
        new_row(ids, cells)
    }
}
