//! Percentage rules: reconciled unit tables and percentages of a sample size.

use fruitqa_path::get_path;
use fruitqa_util::{as_number, cell_from, empty_cell, is_blank, number_cell};
use log::debug;
use serde_json::Value;

use super::stats::{count_cell, Precision};
use super::{cell_path, set_if_changed, Rule, RuleCtx};
use crate::aggregate::{average_of, numbers, sum_of};
use crate::change::{cell_change, CellChange};
use crate::document::Patch;
use crate::reconcile::{reconcile_cell, stored_units, to_percent, valid_denominator};
use crate::row::{find_row, label_of};

/// The value percentages of a column are taken against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denominator {
    /// One document field shared by every column.
    Field(&'static str),
    /// The same column of a labelled row in another table, e.g. the
    /// per-channel fruit count.
    ColumnRow {
        table: &'static str,
        label_key: &'static str,
        label: &'static str,
    },
}

impl Denominator {
    pub fn resolve(&self, data: &Value, column: &str) -> Option<f64> {
        match self {
            Denominator::Field(path) => get_path(data, path).and_then(as_number),
            Denominator::ColumnRow {
                table,
                label_key,
                label,
            } => {
                let rows = get_path(data, table)?.as_array()?;
                let (_, row) = find_row(rows, label_key, label)?;
                row.get(column).and_then(as_number)
            }
        }
    }
}

/// A table whose cells accept unit counts and store percentages, reconciled
/// cell by cell against the previous snapshot.
#[derive(Debug, Clone)]
pub struct UnitPercentTable {
    pub table: &'static str,
    pub label_key: &'static str,
    /// Rows (by label) that are not unit input, e.g. computed summaries.
    pub skip_labels: Vec<&'static str>,
    pub columns: Vec<String>,
    pub denominator: Denominator,
    /// Column receiving the row's average unit count.
    pub row_average: Option<&'static str>,
    pub precision: Precision,
}

impl Rule for UnitPercentTable {
    fn name(&self) -> &'static str {
        "unit_percent_table"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.table) else {
            return Vec::new();
        };
        let precision = self.precision.resolve(ctx.options);
        let avg_precision = ctx.options.weight_precision;
        let prev_rows = ctx.prev_rows(self.table);
        let mut out = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            if self.skip_labels.contains(&label_of(row, self.label_key).as_str()) {
                if let Some(avg) = self.row_average {
                    if row.get(avg).is_some_and(|v| !is_blank(Some(v))) {
                        out.push(Patch::set(cell_path(self.table, i, avg), empty_cell()));
                    }
                }
                continue;
            }
            let mut units = Vec::new();
            let mut touched = false;
            for column in &self.columns {
                let Some(current) = row.get(column.as_str()) else {
                    continue;
                };
                let change = cell_change(self.table, i, column, ctx.prev, ctx.data);
                let prev = match change {
                    CellChange::Added => None,
                    CellChange::Stable => Some(current),
                    CellChange::Edited => Some(
                        prev_rows
                            .and_then(|rows| rows.get(i))
                            .and_then(|r| r.get(column.as_str()))
                            .unwrap_or(&Value::Null),
                    ),
                };
                let current_den = self.denominator.resolve(ctx.data, column);
                let prev_den = self.denominator.resolve(ctx.prev, column);
                let path = cell_path(self.table, i, column);
                let stored = reconcile_cell(&path, current, prev, current_den, prev_den, precision);
                // typed cells count as typed, the rest as the units they store
                let typed = match change {
                    CellChange::Stable => None,
                    CellChange::Added | CellChange::Edited => as_number(current),
                };
                units.extend(typed.or_else(|| stored_units(&stored, current_den)));
                touched |= change.is_user_edit() || stored != *current;
                set_if_changed(&mut out, ctx.data, &path, stored);
            }
            if let Some(avg) = self.row_average {
                // an untouched row keeps the average computed when it was typed
                if touched || row.get(avg).is_none() {
                    let path = cell_path(self.table, i, avg);
                    set_if_changed(&mut out, ctx.data, &path, cell_from(average_of(&units, avg_precision)));
                }
            }
        }
        if !out.is_empty() {
            debug!("{}: {} cell(s) reconciled", self.table, out.len());
        }
        out
    }
}

/// `Comercial` (units) and `% Comercial` rows of a reconciled table, per column.
#[derive(Debug, Clone)]
pub struct CommercialRows {
    pub table: &'static str,
    pub label_key: &'static str,
    pub comercial_label: &'static str,
    pub percent_label: &'static str,
    /// Further rows left out of the unit total.
    pub excluded: Vec<&'static str>,
    pub columns: Vec<String>,
    pub denominator: Denominator,
    pub precision: Precision,
}

impl Rule for CommercialRows {
    fn name(&self) -> &'static str {
        "commercial_rows"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.table) else {
            return Vec::new();
        };
        let comercial = find_row(rows, self.label_key, self.comercial_label).map(|(i, _)| i);
        let percent = find_row(rows, self.label_key, self.percent_label).map(|(i, _)| i);
        if comercial.is_none() && percent.is_none() {
            return Vec::new();
        }
        let precision = self.precision.resolve(ctx.options);
        let counted: Vec<&Value> = rows
            .iter()
            .filter(|row| {
                let label = label_of(row, self.label_key);
                label != self.comercial_label
                    && label != self.percent_label
                    && !self.excluded.contains(&label.as_str())
            })
            .collect();

        let mut out = Vec::new();
        for column in &self.columns {
            let den = valid_denominator(self.denominator.resolve(ctx.data, column));
            let cells: Vec<&Value> = counted
                .iter()
                .filter_map(|row| row.get(column.as_str()))
                .filter(|cell| !is_blank(Some(*cell)))
                .collect();
            let total = (!cells.is_empty())
                .then(|| cells.iter().filter_map(|cell| stored_units(cell, den)).sum::<f64>());
            if let Some(i) = comercial {
                let value = total.map(count_cell).unwrap_or_else(empty_cell);
                set_if_changed(&mut out, ctx.data, &cell_path(self.table, i, column), value);
            }
            if let Some(i) = percent {
                let value = match (total, den) {
                    (Some(total), Some(den)) => number_cell(to_percent(total.round(), den, precision)),
                    _ => empty_cell(),
                };
                set_if_changed(&mut out, ctx.data, &cell_path(self.table, i, column), value);
            }
        }
        out
    }
}

/// Unit columns copied into percentage columns of the same row.
#[derive(Debug, Clone)]
pub struct UnitColumnsPercent {
    pub table: &'static str,
    /// `(units column, percentage column)` pairs.
    pub pairs: Vec<(&'static str, &'static str)>,
    pub denominator: &'static str,
    pub precision: Precision,
}

impl Rule for UnitColumnsPercent {
    fn name(&self) -> &'static str {
        "unit_columns_percent"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.table) else {
            return Vec::new();
        };
        let den = valid_denominator(ctx.get(self.denominator).and_then(as_number));
        let precision = self.precision.resolve(ctx.options);
        let mut out = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            for (units, pct) in &self.pairs {
                let units = row.get(*units).and_then(as_number);
                let value = match (units, den) {
                    (Some(units), Some(den)) => number_cell(to_percent(units, den, precision)),
                    _ => empty_cell(),
                };
                set_if_changed(&mut out, ctx.data, &cell_path(self.table, i, pct), value);
            }
        }
        out
    }
}

/// Exportable fruit: the sample minus the commercial count of a projection table.
#[derive(Debug, Clone)]
pub struct ExportableSummary {
    pub projection: &'static str,
    pub label_key: &'static str,
    pub label: &'static str,
    pub count_column: &'static str,
    pub target: &'static str,
    pub quantity_column: &'static str,
    pub percent_column: &'static str,
    pub denominator: &'static str,
    pub precision: Precision,
}

impl Rule for ExportableSummary {
    fn name(&self) -> &'static str {
        "exportable_summary"
    }

    fn target(&self) -> Option<&str> {
        Some(self.target)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        if ctx.rows(self.target).map_or(true, <[Value]>::is_empty) {
            return Vec::new();
        }
        let sample = valid_denominator(ctx.get(self.denominator).and_then(as_number));
        let commercial = ctx
            .rows(self.projection)
            .and_then(|rows| find_row(rows, self.label_key, self.label))
            .and_then(|(_, row)| row.get(self.count_column))
            .and_then(as_number);
        let (quantity, percent) = match (sample, commercial) {
            (Some(sample), Some(commercial)) => {
                let quantity = (sample - commercial).max(0.0);
                let precision = self.precision.resolve(ctx.options);
                (number_cell(quantity), number_cell(to_percent(quantity, sample, precision)))
            }
            _ => (empty_cell(), empty_cell()),
        };
        let mut out = Vec::new();
        set_if_changed(&mut out, ctx.data, &cell_path(self.target, 0, self.quantity_column), quantity);
        set_if_changed(&mut out, ctx.data, &cell_path(self.target, 0, self.percent_column), percent);
        out
    }
}

/// The last row of a table holds, per column, the total of the rows above it
/// as a percentage of the sample size.
#[derive(Debug, Clone)]
pub struct ColumnPercentRow {
    pub table: &'static str,
    /// Number of input rows; the output row follows them.
    pub input_rows: usize,
    pub columns: Vec<String>,
    pub denominator: &'static str,
    pub precision: Precision,
}

impl Rule for ColumnPercentRow {
    fn name(&self) -> &'static str {
        "column_percent_row"
    }

    fn target(&self) -> Option<&str> {
        Some(self.table)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(rows) = ctx.rows(self.table).filter(|rows| rows.len() == self.input_rows + 1) else {
            return Vec::new();
        };
        let sample = valid_denominator(ctx.get(self.denominator).and_then(as_number));
        let precision = self.precision.resolve(ctx.options);
        let mut out = Vec::new();
        for column in &self.columns {
            let total = sum_of(&numbers(
                rows[..self.input_rows].iter().filter_map(|row| row.get(column.as_str())),
            ));
            let value = match (total, sample) {
                (Some(total), Some(sample)) => number_cell(to_percent(total, sample, precision)),
                _ => empty_cell(),
            };
            set_if_changed(&mut out, ctx.data, &cell_path(self.table, self.input_rows, column), value);
        }
        out
    }
}

/// Per-row totals of a source table, as a percentage of the sample size,
/// written row by row into a target table of the same height.
#[derive(Debug, Clone)]
pub struct RowPercent {
    pub source: &'static str,
    pub rows: usize,
    pub columns: Vec<String>,
    pub target: &'static str,
    pub target_column: &'static str,
    pub denominator: &'static str,
    pub precision: Precision,
}

impl Rule for RowPercent {
    fn name(&self) -> &'static str {
        "row_percent"
    }

    fn target(&self) -> Option<&str> {
        Some(self.target)
    }

    fn apply(&self, ctx: &mut RuleCtx<'_>) -> Vec<Patch> {
        let Some(source) = ctx.rows(self.source).filter(|rows| rows.len() >= self.rows) else {
            return Vec::new();
        };
        if ctx.rows(self.target).map(<[Value]>::len) != Some(self.rows) {
            return Vec::new();
        }
        let sample = valid_denominator(ctx.get(self.denominator).and_then(as_number));
        let precision = self.precision.resolve(ctx.options);
        let mut out = Vec::new();
        for (i, row) in source[..self.rows].iter().enumerate() {
            let total = sum_of(&numbers(self.columns.iter().filter_map(|c| row.get(c.as_str()))));
            let value = match (total, sample) {
                (Some(total), Some(sample)) => number_cell(to_percent(total, sample, precision)),
                _ => empty_cell(),
            };
            set_if_changed(&mut out, ctx.data, &cell_path(self.target, i, self.target_column), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineOptions;
    use crate::rules::numbered;
    use fruitqa_util::SequentialRowIds;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn run(rule: &dyn Rule, prev: &Value, data: &Value) -> Vec<Patch> {
        let options = EngineOptions::default();
        let schemas = BTreeMap::new();
        let mut ids = SequentialRowIds::new("t");
        let mut ctx = RuleCtx {
            prev,
            data,
            schemas: &schemas,
            options: &options,
            ids: &mut ids,
        };
        rule.apply(&mut ctx)
    }

    fn damage_table() -> UnitPercentTable {
        UnitPercentTable {
            table: "danos",
            label_key: "concepto",
            skip_labels: vec!["Comercial", "% Comercial"],
            columns: numbered("l", 2),
            denominator: Denominator::Field("calibre"),
            row_average: Some("promedio_fila"),
            precision: Precision::Percent,
        }
    }

    #[test]
    fn test_denominator_column_row() {
        let den = Denominator::ColumnRow {
            table: "canal",
            label_key: "concepto",
            label: "Nº Frutos",
        };
        let data = json!({"canal": [{"concepto": "Calibre", "ch1": 100}, {"concepto": "Nº Frutos", "ch1": 40}]});
        assert_eq!(den.resolve(&data, "ch1"), Some(40.0));
        assert_eq!(den.resolve(&data, "ch2"), None);
        assert_eq!(Denominator::Field("calibre").resolve(&json!({"calibre": "50"}), "l1"), Some(50.0));
    }

    #[test]
    fn test_unit_percent_table_converts_typed_units() {
        let prev = json!({"calibre": 50, "danos": [{"concepto": "Golpe", "l1": "", "l2": ""}]});
        let data = json!({"calibre": 50, "danos": [{"concepto": "Golpe", "l1": 5, "l2": ""}]});
        assert_eq!(
            run(&damage_table(), &prev, &data),
            vec![
                Patch::set("danos.0.l1", json!(10)),
                Patch::set("danos.0.promedio_fila", json!(5)),
            ]
        );
    }

    #[test]
    fn test_row_average_uses_the_typed_units() {
        let prev = json!({"calibre": 50, "danos": [{"concepto": "Golpe", "l1": "", "promedio_fila": ""}]});
        let data = json!({"calibre": 50, "danos": [{"concepto": "Golpe", "l1": 2.5, "promedio_fila": ""}]});
        assert_eq!(
            run(&damage_table(), &prev, &data),
            vec![
                Patch::set("danos.0.l1", json!(5)),
                Patch::set("danos.0.promedio_fila", json!(2.5)),
            ]
        );

        // once processed, the stored 5% no longer moves the average
        let settled = json!({"calibre": 50, "danos": [{"concepto": "Golpe", "l1": 5, "promedio_fila": 2.5}]});
        assert!(run(&damage_table(), &settled, &settled).is_empty());
    }

    #[test]
    fn test_unit_percent_table_rebases_on_denominator_change() {
        let prev = json!({"calibre": 50, "danos": [{"concepto": "Golpe", "l1": 10, "promedio_fila": 5}]});
        let data = json!({"calibre": 25, "danos": [{"concepto": "Golpe", "l1": 10, "promedio_fila": 5}]});
        assert_eq!(run(&damage_table(), &prev, &data), vec![Patch::set("danos.0.l1", json!(20))]);
    }

    #[test]
    fn test_unit_percent_table_skips_summary_rows() {
        let prev = json!({"calibre": 50, "danos": [{"concepto": "Comercial", "l1": 3, "promedio_fila": 2}]});
        assert_eq!(
            run(&damage_table(), &prev, &prev),
            vec![Patch::set("danos.0.promedio_fila", json!(""))]
        );
    }

    #[test]
    fn test_unit_percent_table_stable_is_silent() {
        let data = json!({"calibre": 50, "danos": [{"concepto": "Golpe", "l1": 10, "l2": "", "promedio_fila": 5}]});
        assert!(run(&damage_table(), &data, &data).is_empty());
    }

    #[test]
    fn test_commercial_rows() {
        let rule = CommercialRows {
            table: "danos",
            label_key: "concepto",
            comercial_label: "Comercial",
            percent_label: "% Comercial",
            excluded: vec!["Resolución"],
            columns: numbered("l", 2),
            denominator: Denominator::Field("calibre"),
            precision: Precision::Percent,
        };
        let data = json!({"calibre": 50, "danos": [
            {"concepto": "Golpe", "l1": 10, "l2": ""},
            {"concepto": "Russet", "l1": 4, "l2": ""},
            {"concepto": "Resolución", "l1": "OK"},
            {"concepto": "Comercial", "l1": "", "l2": ""},
            {"concepto": "% Comercial", "l1": "", "l2": ""}
        ]});
        assert_eq!(
            run(&rule, &data, &data),
            vec![Patch::set("danos.3.l1", json!(7)), Patch::set("danos.4.l1", json!(14))]
        );
    }

    #[test]
    fn test_unit_columns_percent() {
        let rule = UnitColumnsPercent {
            table: "danos_defectos",
            pairs: vec![("leve_unidades", "leve_pct"), ("grave_unidades", "grave_pct")],
            denominator: "recepcion.tamano_muestra",
            precision: Precision::Percent,
        };
        let data = json!({
            "recepcion": {"tamano_muestra": 50},
            "danos_defectos": [{"leve_unidades": 3, "grave_unidades": "", "leve_pct": "", "grave_pct": ""}]
        });
        assert_eq!(run(&rule, &data, &data), vec![Patch::set("danos_defectos.0.leve_pct", json!(6))]);
    }

    #[test]
    fn test_exportable_summary() {
        let rule = ExportableSummary {
            projection: "proy",
            label_key: "categoria",
            label: "Comercial",
            count_column: "n_frutos",
            target: "resumen",
            quantity_column: "cantidad_exportable",
            percent_column: "porcentaje_exportable",
            denominator: "muestra",
            precision: Precision::Percent,
        };
        let data = json!({
            "muestra": 50,
            "proy": [{"categoria": "Comercial", "n_frutos": 8}],
            "resumen": [{}]
        });
        assert_eq!(
            run(&rule, &data, &data),
            vec![
                Patch::set("resumen.0.cantidad_exportable", json!(42)),
                Patch::set("resumen.0.porcentaje_exportable", json!(84)),
            ]
        );
        assert!(run(&rule, &json!({"resumen": []}), &json!({"resumen": []})).is_empty());
    }

    #[test]
    fn test_column_percent_row_and_row_percent() {
        let columns = numbered("g", 2);
        let data = json!({
            "muestra": 20,
            "cor": [{"g1": 1, "g2": ""}, {"g1": 2, "g2": ""}, {"g1": "", "g2": ""}, {}],
            "prom": [{}, {}, {}]
        });
        let total = ColumnPercentRow {
            table: "cor",
            input_rows: 3,
            columns: columns.clone(),
            denominator: "muestra",
            precision: Precision::Percent,
        };
        assert_eq!(
            run(&total, &data, &data),
            vec![Patch::set("cor.3.g1", json!(15)), Patch::set("cor.3.g2", json!(""))]
        );
        let per_row = RowPercent {
            source: "cor",
            rows: 3,
            columns,
            target: "prom",
            target_column: "promedio",
            denominator: "muestra",
            precision: Precision::Percent,
        };
        assert_eq!(
            run(&per_row, &data, &data),
            vec![
                Patch::set("prom.0.promedio", json!(5)),
                Patch::set("prom.1.promedio", json!(10)),
                Patch::set("prom.2.promedio", json!("")),
            ]
        );
    }
}
