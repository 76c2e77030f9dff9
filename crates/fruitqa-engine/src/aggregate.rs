//! Aggregates over numeric-or-empty cells.
//!
//! Blank and non-numeric cells are skipped. When nothing contributes the
//! result is `None`, rendered as the empty-string sentinel, never `0`: a
//! total of zero means the user measured zero.
//!
//! ```
//! use fruitqa_engine::aggregate::{average, sum};
//! use serde_json::json;
//!
//! assert_eq!(sum(&[]), None);
//! assert_eq!(sum(&[json!(5), json!(""), json!(3)]), Some(8.0));
//! assert_eq!(average(&[json!(4), json!(6)], 2), Some(5.0));
//! ```

use fruitqa_util::{as_number, cell_from, is_blank, round_to};
use serde_json::Value;

use crate::row::MatrixLayout;

/// The numeric values among `values`, in order.
pub fn numbers<'a, I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Value>,
{
    values.into_iter().filter_map(as_number).collect()
}

pub fn sum(values: &[Value]) -> Option<f64> {
    sum_of(&numbers(values))
}

pub fn average(values: &[Value], precision: u32) -> Option<f64> {
    average_of(&numbers(values), precision)
}

pub fn max(values: &[Value]) -> Option<f64> {
    max_of(&numbers(values))
}

pub fn min(values: &[Value]) -> Option<f64> {
    min_of(&numbers(values))
}

/// Cells that hold anything other than the blank sentinel.
pub fn count_non_empty(values: &[Value]) -> usize {
    values.iter().filter(|&v| !is_blank(Some(v))).count()
}

pub fn sum_of(xs: &[f64]) -> Option<f64> {
    (!xs.is_empty()).then(|| xs.iter().sum())
}

pub fn average_of(xs: &[f64], precision: u32) -> Option<f64> {
    sum_of(xs).map(|total| round_to(total / xs.len() as f64, precision))
}

pub fn max_of(xs: &[f64]) -> Option<f64> {
    xs.iter().copied().reduce(f64::max)
}

pub fn min_of(xs: &[f64]) -> Option<f64> {
    xs.iter().copied().reduce(f64::min)
}

/// An aggregate selectable from rule configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Average,
    Max,
    Min,
    Count,
}

impl Aggregate {
    pub fn compute(self, xs: &[f64], precision: u32) -> Option<f64> {
        match self {
            Aggregate::Sum => sum_of(xs),
            Aggregate::Average => average_of(xs, precision),
            Aggregate::Max => max_of(xs),
            Aggregate::Min => min_of(xs),
            Aggregate::Count => Some(xs.len() as f64),
        }
    }

    /// The aggregate as a stored cell.
    pub fn cell(self, xs: &[f64], precision: u32) -> Value {
        cell_from(self.compute(xs, precision))
    }
}

/// Average, maximum and minimum of one group of values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub avg: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl Summary {
    pub fn of(xs: &[f64], precision: u32) -> Self {
        Self {
            avg: average_of(xs, precision),
            max: max_of(xs),
            min: min_of(xs),
        }
    }

    pub fn get(&self, aggregate: Aggregate) -> Option<f64> {
        match aggregate {
            Aggregate::Average => self.avg,
            Aggregate::Max => self.max,
            Aggregate::Min => self.min,
            Aggregate::Sum | Aggregate::Count => None,
        }
    }
}

/// Cells of `column` across `rows`; rows without the cell are skipped.
pub fn column_values<'a>(rows: &'a [Value], column: &'a str) -> impl Iterator<Item = &'a Value> {
    rows.iter().filter_map(move |row| row.get(column))
}

/// Numeric detail measurements of every matrix entry, crossing entry boundaries.
pub fn flatten_details(entries: &[Value], layout: &MatrixLayout) -> Vec<f64> {
    numbers(entries.iter().flat_map(|entry| layout.detail_cells(entry)))
}
