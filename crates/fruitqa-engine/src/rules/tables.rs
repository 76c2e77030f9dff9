//! Structural rules: rows synced, sized, seeded or reset from other fields.

use fruitqa_util::{as_number, empty_cell, is_blank, RowIdSource};
use log::debug;
use serde_json::{Map, Value};

use super::{cell_path, set_if_changed, set_rows_if_changed, Rule, RuleCtx};
use crate::change::{value_changed, was_user_edited};
use crate::document::Patch;
use crate::row::{find_row, fixed_row, label_of, new_row, MatrixLayout, IS_FIXED};
use crate::sync::{distinct_labels, sync_rows};
use crate::template::{Column, ColumnKind};

/// Shape of the rows a rule creates.
#[derive(Debug, Clone)]
pub enum RowShape {
    /// A pressure/weight matrix entry with no samples.
    Matrix(MatrixLayout),
    /// A plain row with the given cells blank.
    Cells(Vec<String>),
}

impl RowShape {
    fn build(&self, ids: &mut dyn RowIdSource, label_key: &str, label: &str) -> Value {
        match self {
            RowShape::Matrix(layout) => layout.entry(ids, label),
            RowShape::Cells(columns) => {
                let mut cells = Map::new();
                cells.insert(label_key.to_string(), Value::String(label.to_string()));
                for column in columns {
                    cells.insert(column.clone(), empty_cell());
                }
                new_row(ids, cells)
            }
        }
    }
}

/// One row in `target` per distinct label found in `source`, followed by the
/// target's manual rows.
#[derive(Debug, Clone)]
pub struct SyncLabels {
    pub source: &'static str,
    pub source_key: &'static str,
    pub target: &'static str,
    pub target_key: &'static str,
    pub shape: RowShape,
}

impl Rule for SyncLabels {
    fn name(&self) -> &'static str {
        "sync_labels"
    }

    fn target(&self) -> Option<&str> {
        Some(self.target)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(source) = ctx.rows(self.source) else {
            return Vec::new();
        };
        let labels = distinct_labels(source, self.source_key);
        let current = ctx.rows(self.target).unwrap_or(&[]);
        let ids = &mut *ctx.ids;
        let synced = sync_rows(&labels, current, self.target_key, &mut |label: &str| {
            self.shape.build(&mut *ids, self.target_key, label)
        });
        let mut out = Vec::new();
        set_rows_if_changed(&mut out, ctx.data, self.target, synced);
        if !out.is_empty() {
            debug!("{}: rows synced from {} ({} labels)", self.target, self.source, labels.len());
        }
        out
    }
}

/// Largest row count a count field may ask for.
pub const MAX_ROWS: usize = 500;

/// A fixed-size list of numbered rows whose length follows a count field.
///
/// Counts that are not numbers, are negative or exceed [`MAX_ROWS`] leave
/// the table as it is.
#[derive(Debug, Clone)]
pub struct RowCountFromField {
    pub count: &'static str,
    pub table: &'static str,
    /// Column receiving the 1-based row number, as text.
    pub index_column: &'static str,
    /// Blank cells of a created row.
    pub cells: Vec<&'static str>,
}

impl Rule for RowCountFromField {
    fn name(&self) -> &'static str {
        "row_count_from_field"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let count = ctx.get(self.count);
        let wanted = if is_blank(count) {
            0
        } else {
            match count.and_then(as_number) {
                Some(n) if n >= 0.0 && n < (MAX_ROWS + 1) as f64 => n.trunc() as usize,
                Some(n) => {
                    debug!("{}: ignoring row count {n}", self.table);
                    return Vec::new();
                }
                None => return Vec::new(),
            }
        };
        let current = ctx.rows(self.table).unwrap_or(&[]);
        if current.len() == wanted {
            return Vec::new();
        }
        let mut rows: Vec<Value> = current.iter().take(wanted).cloned().collect();
        for i in rows.len()..wanted {
            let mut cells = Map::new();
            cells.insert(self.index_column.to_string(), Value::String((i + 1).to_string()));
            for cell in &self.cells {
                cells.insert(cell.to_string(), empty_cell());
            }
            cells.insert(IS_FIXED.to_string(), Value::Bool(true));
            rows.push(new_row(ctx.ids, cells));
        }
        vec![Patch::set(self.table, Value::Array(rows))]
    }
}

/// Text of a header value, or `None` when it is blank or zero.
fn header_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A header field copied into one column of every row of a table. The first
/// row is created once the field holds a value.
#[derive(Debug, Clone)]
pub struct MirrorFieldIntoRows {
    pub source: &'static str,
    pub table: &'static str,
    pub column: &'static str,
    /// Cells of the first row besides the mirrored one.
    pub seed: Vec<(&'static str, Value)>,
}

impl Rule for MirrorFieldIntoRows {
    fn name(&self) -> &'static str {
        "mirror_field_into_rows"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let expected = header_text(ctx.get(self.source));
        let rows = ctx.rows(self.table).unwrap_or(&[]);
        let mut out = Vec::new();
        if rows.is_empty() {
            if let Some(text) = expected {
                let mut cells = Map::new();
                cells.insert(self.column.to_string(), Value::String(text));
                for (key, value) in &self.seed {
                    cells.insert(key.to_string(), value.clone());
                }
                out.push(Patch::set(self.table, Value::Array(vec![new_row(ctx.ids, cells)])));
            }
            return out;
        }
        let value = Value::String(expected.unwrap_or_default());
        for i in 0..rows.len() {
            set_if_changed(&mut out, ctx.data, &cell_path(self.table, i, self.column), value.clone());
        }
        out
    }
}

/// The first entry of a matrix carries the header field as its label.
///
/// Without a header value, a lone untouched seed entry is removed and any
/// other first entry loses its label.
#[derive(Debug, Clone)]
pub struct MatrixSeedLabel {
    pub source: &'static str,
    pub matrix: &'static str,
    pub layout: MatrixLayout,
}

impl Rule for MatrixSeedLabel {
    fn name(&self) -> &'static str {
        "matrix_seed_label"
    }

    fn target(&self) -> Option<&str> {
        Some(self.matrix)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let label = match ctx.get(self.source) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let matrix = ctx.rows(self.matrix).unwrap_or(&[]);
        let label_key = self.layout.label_key;
        let label_path = cell_path(self.matrix, 0, label_key);
        let mut out = Vec::new();

        match matrix.first() {
            None if !label.is_empty() => {
                let entry = self.layout.entry(ctx.ids, &label);
                out.push(Patch::set(self.matrix, Value::Array(vec![entry])));
            }
            None => {}
            Some(_) if !label.is_empty() => {
                set_if_changed(&mut out, ctx.data, &label_path, Value::String(label));
            }
            Some(first) if !label_of(first, label_key).is_empty() => {
                let samples = first.get(self.layout.count_key).and_then(as_number).unwrap_or(0.0);
                if matrix.len() == 1 && samples == 0.0 {
                    out.push(Patch::set(self.matrix, Value::Array(Vec::new())));
                } else {
                    out.push(Patch::set(label_path, empty_cell()));
                }
            }
            Some(_) => {}
        }
        out
    }
}

/// A governed table goes back to a single fixed row when the watched field changes.
#[derive(Debug, Clone)]
pub struct ResetOnChange {
    pub watch: &'static str,
    pub table: &'static str,
}

impl Rule for ResetOnChange {
    fn name(&self) -> &'static str {
        "reset_on_change"
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        if !value_changed(self.watch, ctx.prev, ctx.data) {
            return Vec::new();
        }
        debug!("{} changed, resetting {}", self.watch, self.table);
        vec![Patch::set(self.table, Value::Array(vec![fixed_row(ctx.ids)]))]
    }
}

/// Category column labels of a variety group.
pub fn category_labels(group: &str) -> Option<&'static [&'static str]> {
    Some(match group {
        "ROJAS" => &["+95", "+85", "+76", "-76"],
        "GALA" => &["+50", "+50", "+30", "-30"],
        "CRIPPS PINK" => &["+40", "+30", "-30"],
        "AMBROSIA" => &["+40", "+10", "-10"],
        "FUJI" => &["+60", "+40", "-4"],
        "KANZI" => &["+30", "-30"],
        _ => return None,
    })
}

/// Integer columns `cat_0..` labelled for a variety group.
pub fn category_columns(group: &str) -> Option<Vec<Column>> {
    let labels = category_labels(group)?;
    Some(
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| Column::new(format!("cat_{i}"), *label, ColumnKind::Integer))
            .collect(),
    )
}

/// Runtime columns of a table derived from the selected variety group.
#[derive(Debug, Clone)]
pub struct VarietySchema {
    pub group_path: &'static str,
    pub table: &'static str,
}

impl Rule for VarietySchema {
    fn name(&self) -> &'static str {
        "variety_schema"
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let group = match ctx.get(self.group_path) {
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            _ => return Vec::new(),
        };
        let current = ctx.schemas.get(self.table);
        match category_columns(group) {
            Some(columns) => {
                let same_labels = current.is_some_and(|cols| {
                    cols.iter().map(|c| c.label.as_str()).eq(columns.iter().map(|c| c.label.as_str()))
                });
                if same_labels {
                    Vec::new()
                } else {
                    vec![Patch::schema(self.table, Some(columns))]
                }
            }
            None if current.is_some() => vec![Patch::schema(self.table, None)],
            None => Vec::new(),
        }
    }
}

/// Editing a line cell of the trigger row fills (or clears) the same line of
/// the listed rows from header fields.
#[derive(Debug, Clone)]
pub struct LineAutofill {
    pub table: &'static str,
    pub label_key: &'static str,
    pub trigger: &'static str,
    /// `(row label, header field)` pairs.
    pub fills: Vec<(&'static str, &'static str)>,
    pub columns: Vec<String>,
}

impl Rule for LineAutofill {
    fn name(&self) -> &'static str {
        "line_autofill"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.table) else {
            return Vec::new();
        };
        let Some((trigger_idx, trigger_row)) = find_row(rows, self.label_key, self.trigger) else {
            return Vec::new();
        };
        let trigger_existed = ctx
            .prev_rows(self.table)
            .and_then(|prev| prev.get(trigger_idx))
            .is_some_and(|prev| label_of(prev, self.label_key) == self.trigger);
        if !trigger_existed {
            return Vec::new();
        }

        let mut out = Vec::new();
        for column in &self.columns {
            if !was_user_edited(self.table, trigger_idx, column, ctx.prev, ctx.data) {
                continue;
            }
            let filled = !label_of(trigger_row, column).is_empty();
            for (label, source) in &self.fills {
                let Some((i, _)) = find_row(rows, self.label_key, label) else {
                    continue;
                };
                let value = if filled {
                    ctx.get(source).filter(|v| !is_blank(Some(*v))).cloned().unwrap_or_else(empty_cell)
                } else {
                    empty_cell()
                };
                set_if_changed(&mut out, ctx.data, &cell_path(self.table, i, column), value);
            }
        }
        out
    }
}
