//! Aggregate rules: summaries of matrices, row statistics and column totals.

use fruitqa_util::{as_number, cell_from, number_cell, round_to};
use serde_json::{Map, Value};

use super::{cell_path, set_if_changed, set_rows_if_changed, Rule, RuleCtx};
use crate::aggregate::{self, numbers, Aggregate, Summary};
use crate::config::EngineOptions;
use crate::document::Patch;
use crate::row::{new_row, row_id, MatrixLayout, ROW_ID};

/// Decimal places of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Weights and pressures, from [`EngineOptions::weight_precision`].
    Weight,
    /// Percentages, from [`EngineOptions::percent_precision`].
    Percent,
    Fixed(u32),
}

impl Precision {
    pub fn resolve(self, options: &EngineOptions) -> u32 {
        match self {
            Precision::Weight => options.weight_precision,
            Precision::Percent => options.percent_precision,
            Precision::Fixed(places) => places,
        }
    }
}

/// Where a rule collects its input numbers from.
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// Every detail measurement of a matrix, across all entries.
    Details {
        matrix: &'static str,
        layout: MatrixLayout,
    },
    /// Every cell of the given columns, across all rows of a table.
    Columns {
        table: &'static str,
        columns: Vec<String>,
    },
}

impl ValueSource {
    pub fn table(&self) -> &'static str {
        match self {
            ValueSource::Details { matrix, .. } => *matrix,
            ValueSource::Columns { table, .. } => *table,
        }
    }

    /// Input numbers, or `None` when the source table is absent.
    pub fn values(&self, ctx: &RuleCtx<'_>) -> Option<Vec<f64>> {
        let rows = ctx.rows(self.table())?;
        Some(match self {
            ValueSource::Details { layout, .. } => aggregate::flatten_details(rows, layout),
            ValueSource::Columns { columns, .. } => numbers(
                rows.iter()
                    .flat_map(move |row| columns.iter().filter_map(move |c| row.get(c.as_str()))),
            ),
        })
    }
}

/// Scalar summary fields computed from a value source.
#[derive(Debug, Clone)]
pub struct SummaryFields {
    pub source: ValueSource,
    pub outputs: Vec<(Aggregate, &'static str)>,
    pub precision: Precision,
    /// Require a positive total of declared samples in a matrix source.
    pub require_samples: bool,
}

impl Rule for SummaryFields {
    fn name(&self) -> &'static str {
        "summary_fields"
    }

    fn target(&self) -> Option<&str> {
        self.outputs.first().map(|(_, path)| *path)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(mut values) = self.source.values(ctx) else {
            return Vec::new();
        };
        if self.require_samples {
            if let ValueSource::Details { matrix, layout } = &self.source {
                let declared: f64 = ctx
                    .rows(matrix)
                    .unwrap_or(&[])
                    .iter()
                    .filter_map(|entry| entry.get(layout.count_key).and_then(as_number))
                    .sum();
                if declared <= 0.0 {
                    values.clear();
                }
            }
        }
        let precision = self.precision.resolve(ctx.options);
        let mut out = Vec::new();
        for (aggregate, path) in &self.outputs {
            set_if_changed(&mut out, ctx.data, path, aggregate.cell(&values, precision));
        }
        out
    }
}

/// Fill one column of a three-row summary grid (average, maximum, minimum).
#[derive(Debug, Clone)]
pub struct SummaryColumn {
    pub source: ValueSource,
    pub table: &'static str,
    pub column: &'static str,
    pub precision: Precision,
}

const GRID: [Aggregate; 3] = [Aggregate::Average, Aggregate::Max, Aggregate::Min];

impl Rule for SummaryColumn {
    fn name(&self) -> &'static str {
        "summary_column"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        if ctx.rows(self.table).map(<[Value]>::len) != Some(GRID.len()) {
            return Vec::new();
        }
        let values = self.source.values(ctx).unwrap_or_default();
        let summary = Summary::of(&values, self.precision.resolve(ctx.options));
        let mut out = Vec::new();
        for (i, aggregate) in GRID.iter().enumerate() {
            let path = cell_path(self.table, i, self.column);
            set_if_changed(&mut out, ctx.data, &path, cell_from(summary.get(*aggregate)));
        }
        out
    }
}

/// A summary grid column aggregated from other summary grids: the average
/// of their averages, the maximum of their maxima, the minimum of their minima.
#[derive(Debug, Clone)]
pub struct SummaryOfSummaries {
    /// `(table, column)` of each input grid.
    pub inputs: Vec<(&'static str, &'static str)>,
    pub table: &'static str,
    pub column: &'static str,
    pub precision: Precision,
}

impl Rule for SummaryOfSummaries {
    fn name(&self) -> &'static str {
        "summary_of_summaries"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        if ctx.rows(self.table).map(<[Value]>::len) != Some(GRID.len()) {
            return Vec::new();
        }
        let precision = self.precision.resolve(ctx.options);
        let mut out = Vec::new();
        for (i, aggregate) in GRID.iter().enumerate() {
            let row_values: Vec<f64> = self
                .inputs
                .iter()
                .filter_map(|(table, column)| {
                    ctx.rows(table)?.get(i)?.get(*column).and_then(as_number)
                })
                .collect();
            let path = cell_path(self.table, i, self.column);
            set_if_changed(&mut out, ctx.data, &path, aggregate.cell(&row_values, precision));
        }
        out
    }
}

/// Per-entry statistics of a matrix, stored on the entry itself.
#[derive(Debug, Clone)]
pub struct MatrixRowStats {
    pub matrix: &'static str,
    pub layout: MatrixLayout,
    pub avg: Option<&'static str>,
    pub max: Option<&'static str>,
    pub min: Option<&'static str>,
    pub precision: Precision,
}

impl Rule for MatrixRowStats {
    fn name(&self) -> &'static str {
        "matrix_row_stats"
    }

    fn target(&self) -> Option<&str> {
        Some(self.matrix)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(entries) = ctx.rows(self.matrix) else {
            return Vec::new();
        };
        let precision = self.precision.resolve(ctx.options);
        let mut out = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let summary = Summary::of(&numbers(self.layout.detail_cells(entry)), precision);
            for (column, aggregate) in [
                (self.max, Aggregate::Max),
                (self.min, Aggregate::Min),
                (self.avg, Aggregate::Average),
            ] {
                if let Some(column) = column {
                    let path = cell_path(self.matrix, i, column);
                    set_if_changed(&mut out, ctx.data, &path, cell_from(summary.get(aggregate)));
                }
            }
        }
        out
    }
}

/// Per-row count and average over a set of columns.
#[derive(Debug, Clone)]
pub struct RowStats {
    pub table: &'static str,
    pub columns: Vec<String>,
    /// Column receiving the number of numeric cells; always a number.
    pub count: Option<&'static str>,
    pub avg: &'static str,
    pub precision: Precision,
}

impl Rule for RowStats {
    fn name(&self) -> &'static str {
        "row_stats"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.table) else {
            return Vec::new();
        };
        let precision = self.precision.resolve(ctx.options);
        let mut out = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let xs = numbers(self.columns.iter().filter_map(|c| row.get(c.as_str())));
            if let Some(count) = self.count {
                let path = cell_path(self.table, i, count);
                set_if_changed(&mut out, ctx.data, &path, Value::from(xs.len()));
            }
            let path = cell_path(self.table, i, self.avg);
            set_if_changed(&mut out, ctx.data, &path, Aggregate::Average.cell(&xs, precision));
        }
        out
    }
}

/// A labelled totals row holding the per-column sum of every other row,
/// optionally summed again into a grand-total field.
#[derive(Debug, Clone)]
pub struct ColumnTotalsRow {
    pub table: &'static str,
    pub label_key: &'static str,
    pub total_label: &'static str,
    pub columns: Vec<String>,
    pub grand_total: Option<&'static str>,
}

impl Rule for ColumnTotalsRow {
    fn name(&self) -> &'static str {
        "column_totals_row"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.table) else {
            return Vec::new();
        };
        let is_total = |row: &Value| row.get(self.label_key).and_then(Value::as_str) == Some(self.total_label);
        let Some(total_idx) = rows.iter().position(is_total) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut column_totals = Vec::new();
        for column in &self.columns {
            let xs = numbers(
                rows.iter()
                    .filter(|row| !is_total(*row))
                    .filter_map(|row| row.get(column.as_str())),
            );
            let total = aggregate::sum_of(&xs);
            column_totals.extend(total);
            let path = cell_path(self.table, total_idx, column);
            set_if_changed(&mut out, ctx.data, &path, cell_from(total));
        }
        if let Some(grand_total) = self.grand_total {
            set_if_changed(&mut out, ctx.data, grand_total, cell_from(aggregate::sum_of(&column_totals)));
        }
        out
    }
}

/// A single-row table holding the column sums of another table.
#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub source: &'static str,
    pub columns: Vec<&'static str>,
    pub target: &'static str,
}

impl Rule for SummaryRow {
    fn name(&self) -> &'static str {
        "summary_row"
    }

    fn target(&self) -> Option<&str> {
        Some(self.target)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.source) else {
            return Vec::new();
        };
        let mut cells = Map::new();
        for column in &self.columns {
            let total = aggregate::sum(&aggregate::column_values(rows, column).cloned().collect::<Vec<_>>());
            cells.insert(column.to_string(), cell_from(total));
        }
        let existing_id = ctx
            .rows(self.target)
            .and_then(|rows| rows.first())
            .and_then(row_id)
            .map(str::to_string);
        let row = match existing_id {
            Some(id) => {
                cells.insert(ROW_ID.to_string(), Value::String(id));
                Value::Object(cells)
            }
            None => new_row(ctx.ids, cells),
        };
        let mut out = Vec::new();
        set_rows_if_changed(&mut out, ctx.data, self.target, vec![row]);
        out
    }
}

/// `target = round(source * factor)`; blank when the source is not a number.
#[derive(Debug, Clone)]
pub struct ScaledField {
    pub source: &'static str,
    pub factor: f64,
    pub precision: Precision,
    pub target: &'static str,
}

impl Rule for ScaledField {
    fn name(&self) -> &'static str {
        "scaled_field"
    }

    fn target(&self) -> Option<&str> {
        Some(self.target)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(source) = ctx.get(self.source) else {
            return Vec::new();
        };
        let precision = self.precision.resolve(ctx.options);
        let value = cell_from(as_number(source).map(|x| round_to(x * self.factor, precision)));
        let mut out = Vec::new();
        set_if_changed(&mut out, ctx.data, self.target, value);
        out
    }
}

/// Round a count for storage as a whole-number cell.
pub(crate) fn count_cell(x: f64) -> Value {
    number_cell(x.round())
}
